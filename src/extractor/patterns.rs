//! Pattern library for dash cam listings.
//!
//! Every table is ordered: extractors test entries top to bottom and keep the
//! first hit. Confidences are the base values before source weighting.

use anyhow::{Context, Result};
use regex::{Captures, Regex, RegexBuilder};

/// Pattern that maps straight to a fixed value
#[derive(Debug, Clone, Copy)]
pub struct ValuePattern<T: 'static> {
    pub pattern: &'static str,
    pub value: T,
    pub confidence: f64,
}

/// Pattern whose value is read from capture groups
#[derive(Debug, Clone, Copy)]
pub struct CapturePattern {
    pub pattern: &'static str,
    pub confidence: f64,
}

pub const RESOLUTION_PATTERNS: &[ValuePattern<&str>] = &[
    ValuePattern { pattern: r"4K|2160p|3840\s*x\s*2160", value: "4K", confidence: 0.9 },
    ValuePattern { pattern: r"2.5K|1440p|2560\s*x\s*1440", value: "1440p", confidence: 0.9 },
    ValuePattern { pattern: r"1080p|1920\s*x\s*1080|Full\s*HD|FHD", value: "1080p", confidence: 0.9 },
    ValuePattern { pattern: r"720p|1280\s*x\s*720|HD", value: "720p", confidence: 0.9 },
];

pub const FPS_PATTERNS: &[CapturePattern] = &[
    CapturePattern { pattern: r"(\d+)\s*fps", confidence: 0.9 },
    CapturePattern { pattern: r"(\d+)\s*frames?\s*per\s*second", confidence: 0.9 },
    CapturePattern { pattern: r"(\d+)\s*hz\s*recording", confidence: 0.8 },
];

pub const FOV_PATTERNS: &[CapturePattern] = &[
    CapturePattern { pattern: r"(\d+)[\s-]*degrees?(?:\s*FOV)?", confidence: 0.9 },
    CapturePattern { pattern: r"FOV[\s:]*(\d+)[\s-]*degrees?", confidence: 0.9 },
    CapturePattern { pattern: r"(\d+)°(?:\s*wide)?(?:\s*angle)?", confidence: 0.85 },
    CapturePattern { pattern: r"wide\s*angle[\s:]*(\d+)[\s-]*degrees?", confidence: 0.8 },
];

pub const SCREEN_SIZE_PATTERNS: &[CapturePattern] = &[
    CapturePattern {
        pattern: r#"(\d+(?:\.\d+)?)["”″\s-]*inch(?:es)?(?:\s*screen|\s*display)?"#,
        confidence: 0.9,
    },
    CapturePattern {
        pattern: r#"(?:screen|display)[\s:]*(\d+(?:\.\d+)?)["”″\s-]*inch(?:es)?"#,
        confidence: 0.9,
    },
    CapturePattern { pattern: r#"(\d+(?:\.\d+)?)["”″](?:\s*screen|\s*display)?"#, confidence: 0.85 },
];

pub const SCREEN_TYPE_PATTERNS: &[ValuePattern<&str>] = &[
    ValuePattern { pattern: r"IPS\s*(?:screen|display)", value: "IPS", confidence: 0.9 },
    ValuePattern { pattern: r"LCD\s*(?:screen|display)", value: "LCD", confidence: 0.9 },
    ValuePattern { pattern: r"OLED\s*(?:screen|display)", value: "OLED", confidence: 0.9 },
    ValuePattern { pattern: r"TFT\s*(?:screen|display)", value: "TFT", confidence: 0.9 },
    ValuePattern { pattern: r"LED\s*(?:screen|display)", value: "LED", confidence: 0.85 },
];

// Three-channel phrases go first: "front rear interior" also contains "front rear".
pub const CHANNEL_PATTERNS: &[ValuePattern<u8>] = &[
    ValuePattern { pattern: r"3\s*channel|3ch\b", value: 3, confidence: 0.9 },
    ValuePattern { pattern: r"front\s*(?:and\s*|&\s*|\+\s*|,\s*)?rear\s*(?:and\s*|&\s*|\+\s*|,\s*)?(?:interior|cabin|inside)", value: 3, confidence: 0.9 },
    ValuePattern { pattern: r"triple\s*camera", value: 3, confidence: 0.9 },
    ValuePattern { pattern: r"dual\s*camera", value: 2, confidence: 0.9 },
    ValuePattern { pattern: r"front\s*(?:and\s*|&\s*|\+\s*)?rear", value: 2, confidence: 0.9 },
    ValuePattern { pattern: r"2\s*channel|2ch\b", value: 2, confidence: 0.9 },
    ValuePattern { pattern: r"single\s*camera", value: 1, confidence: 0.9 },
    ValuePattern { pattern: r"front\s*only", value: 1, confidence: 0.85 },
];

pub const SIZE_DESCRIPTION_PATTERNS: &[ValuePattern<&str>] = &[
    ValuePattern { pattern: r"compact|mini|small", value: "Compact", confidence: 0.8 },
    ValuePattern { pattern: r"discreet", value: "Discreet", confidence: 0.8 },
    ValuePattern { pattern: r"low\s*profile", value: "Low Profile", confidence: 0.8 },
];

pub const WIFI_FREQUENCY_PATTERNS: &[ValuePattern<&str>] = &[
    ValuePattern { pattern: r"5GHz|5\s*GHz|5G\s*WiFi", value: "5GHz", confidence: 0.9 },
    ValuePattern { pattern: r"2\.4GHz|2\.4\s*GHz|2\.4G\s*WiFi", value: "2.4GHz", confidence: 0.9 },
    ValuePattern { pattern: r"dual\s*band\s*WiFi", value: "Dual Band", confidence: 0.9 },
];

pub const INCLUDED_STORAGE_PATTERNS: &[CapturePattern] = &[
    CapturePattern { pattern: r"includes?\s*(\d+)\s*GB\s*(?:memory\s*card|SD\s*card|card)", confidence: 0.9 },
    CapturePattern { pattern: r"(\d+)\s*GB\s*(?:memory\s*card|SD\s*card|card)\s*included", confidence: 0.9 },
    CapturePattern { pattern: r"comes?\s*with\s*(\d+)\s*GB\s*(?:memory\s*card|SD\s*card|card)", confidence: 0.9 },
    CapturePattern { pattern: r"included\s*(\d+)\s*GB\s*(?:memory\s*card|SD\s*card|card)", confidence: 0.85 },
];

pub const MAX_STORAGE_PATTERNS: &[CapturePattern] = &[
    CapturePattern { pattern: r"supports?\s*(?:up\s*to)?\s*(\d+)\s*GB", confidence: 0.9 },
    CapturePattern { pattern: r"max(?:imum)?\s*(\d+)\s*GB", confidence: 0.9 },
    CapturePattern { pattern: r"up\s*to\s*(\d+)\s*GB\s*(?:memory\s*card|SD\s*card)", confidence: 0.9 },
];

/// Trailing numeric model code such as "... 010-02505-00"
pub const MODEL_NUMBER_PATTERN: CapturePattern = CapturePattern {
    pattern: r"[-\s](\d+[-\d]+(?:[-\w]+)?)\s*$",
    confidence: 0.7,
};

pub const TEMPERATURE_PATTERNS: &[CapturePattern] = &[
    CapturePattern {
        pattern: r"operating\s*temperature\s*(?:range)?[\s:]*(-?\d+)(?:\s*to\s*|\s*-\s*|\s*~\s*)(-?\d+)\s*(?:°C|°F|C|F)",
        confidence: 0.9,
    },
    CapturePattern {
        pattern: r"temperature\s*range[\s:]*(-?\d+)(?:\s*to\s*|\s*-\s*|\s*~\s*)(-?\d+)\s*(?:°C|°F|C|F)",
        confidence: 0.8,
    },
];

pub const POWER_SOURCE_PATTERNS: &[ValuePattern<&str>] = &[
    ValuePattern { pattern: r"hardwire|direct\s*wire", value: "Hardwire", confidence: 0.9 },
    ValuePattern { pattern: r"car\s*charger|cigarette\s*lighter|12v", value: "Car Charger", confidence: 0.9 },
    ValuePattern { pattern: r"battery|rechargeable", value: "Battery", confidence: 0.9 },
    ValuePattern { pattern: r"capacitor|supercapacitor|super\s*capacitor", value: "Capacitor", confidence: 0.9 },
];

/// Boolean feature flags: (attribute name, pattern). The attribute name is
/// also the key fragment searched for in structured vendor specs.
pub const FLAG_PATTERNS: &[(&str, &str)] = &[
    ("hdr", r"\bHDR\b|High\s*Dynamic\s*Range"),
    ("nightVision", r"night\s*vision|starvis|starlight|low\s*light"),
    ("wdr", r"\bWDR\b|Wide\s*Dynamic\s*Range"),
    ("wifi", r"WiFi|Wi-Fi|Wireless|connect\s*to\s*smartphone"),
    ("bluetooth", r"Bluetooth|BT\d"),
    ("gps", r"GPS|Global\s*Positioning"),
    ("voiceControl", r"voice\s*control|voice\s*command|voice\s*activated"),
    ("parkingMode", r"parking\s*mode|parking\s*monitor"),
    ("motionDetection", r"motion\s*detect|motion\s*sensor"),
    ("loopRecording", r"loop\s*recording|loop\s*record|seamless\s*recording"),
    (
        "emergencyRecording",
        r"emergency\s*recording|emergency\s*record|g-sensor|collision\s*detection",
    ),
    ("timeLapse", r"time\s*lapse|timelapse|time-lapse"),
    (
        "remoteMonitoring",
        r"monitor\s*your\s*vehicle\s*while\s*away|remote\s*monitoring|remote\s*view",
    ),
    (
        "memoryCardIncluded",
        r"includes?\s*(?:memory\s*card|SD\s*card)|(?:memory\s*card|SD\s*card)\s*included|included\s*\d+\s*GB\s*card",
    ),
];

/// Listing titles that indicate a dead or error page
pub const ERROR_PAGE_PATTERN: &str = r"page\s*not\s*found|\berror\b|not\s*available|not\s*exist";

/// Compiled pattern carrying a fixed value
#[derive(Debug, Clone)]
pub struct CompiledValue<T> {
    pub regex: Regex,
    pub value: T,
    pub confidence: f64,
}

/// Compiled pattern read through capture groups
#[derive(Debug, Clone)]
pub struct CompiledCapture {
    pub regex: Regex,
    pub confidence: f64,
}

impl CompiledCapture {
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.regex.captures(text)
    }
}

/// Compiled boolean flag pattern
#[derive(Debug, Clone)]
pub struct CompiledFlag {
    pub name: &'static str,
    pub regex: Regex,
}

/// All tables compiled once, case-insensitive
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    pub resolution: Vec<CompiledValue<&'static str>>,
    pub fps: Vec<CompiledCapture>,
    pub fov: Vec<CompiledCapture>,
    pub screen_size: Vec<CompiledCapture>,
    pub screen_type: Vec<CompiledValue<&'static str>>,
    pub channels: Vec<CompiledValue<u8>>,
    pub size_description: Vec<CompiledValue<&'static str>>,
    pub wifi_frequency: Vec<CompiledValue<&'static str>>,
    pub included_storage: Vec<CompiledCapture>,
    pub max_storage: Vec<CompiledCapture>,
    pub model_number: CompiledCapture,
    pub temperature: Vec<CompiledCapture>,
    pub power_source: Vec<CompiledValue<&'static str>>,
    pub flags: Vec<CompiledFlag>,
    pub error_page: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("Invalid extraction pattern: {}", pattern))
}

fn compile_values<T: Copy + 'static>(table: &[ValuePattern<T>]) -> Result<Vec<CompiledValue<T>>> {
    table
        .iter()
        .map(|p| {
            Ok(CompiledValue {
                regex: compile(p.pattern)?,
                value: p.value,
                confidence: p.confidence,
            })
        })
        .collect()
}

fn compile_captures(table: &[CapturePattern]) -> Result<Vec<CompiledCapture>> {
    table.iter().map(compile_capture).collect()
}

fn compile_capture(p: &CapturePattern) -> Result<CompiledCapture> {
    Ok(CompiledCapture {
        regex: compile(p.pattern)?,
        confidence: p.confidence,
    })
}

impl PatternLibrary {
    /// Compile every table
    pub fn compile() -> Result<Self> {
        let flags = FLAG_PATTERNS
            .iter()
            .map(|&(name, pattern)| {
                Ok(CompiledFlag {
                    name,
                    regex: compile(pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            resolution: compile_values(RESOLUTION_PATTERNS)?,
            fps: compile_captures(FPS_PATTERNS)?,
            fov: compile_captures(FOV_PATTERNS)?,
            screen_size: compile_captures(SCREEN_SIZE_PATTERNS)?,
            screen_type: compile_values(SCREEN_TYPE_PATTERNS)?,
            channels: compile_values(CHANNEL_PATTERNS)?,
            size_description: compile_values(SIZE_DESCRIPTION_PATTERNS)?,
            wifi_frequency: compile_values(WIFI_FREQUENCY_PATTERNS)?,
            included_storage: compile_captures(INCLUDED_STORAGE_PATTERNS)?,
            max_storage: compile_captures(MAX_STORAGE_PATTERNS)?,
            model_number: compile_capture(&MODEL_NUMBER_PATTERN)?,
            temperature: compile_captures(TEMPERATURE_PATTERNS)?,
            power_source: compile_values(POWER_SOURCE_PATTERNS)?,
            flags,
            error_page: compile(ERROR_PAGE_PATTERN)?,
        })
    }

    /// Look up a flag pattern by attribute name
    pub fn flag(&self, name: &str) -> Option<&CompiledFlag> {
        self.flags.iter().find(|f| f.name == name)
    }
}
