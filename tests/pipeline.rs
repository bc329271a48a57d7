use dashcam_finder::catalog::{load_catalog, load_raw_products, normalized_products, save_catalog};
use dashcam_finder::{
    apply_filters, sort_products, FilterState, Marketplace, ProductProcessor, ProductRecord,
    SortKey,
};
use tempfile::tempdir;

const RAW_PRODUCTS: &str = r#"[
  {
    "id": 1,
    "brand": "REDTIGER",
    "model": "REDTIGER F7NP Front Rear, 4K/2.5K Full HD Dash Camera for Cars, Included 32GB Card, Built-in Wi-Fi GPS, 3.16\" IPS Screen, Night Vision, 170°Wide Angle, WDR, 24H Parking Mode",
    "image": "https://m.media-amazon.com/images/I/f7np.jpg",
    "price": {"amazon_com": 119.99, "amazon_uk": 109.99},
    "rating": 4.6,
    "reviewCount": 8000,
    "popularity": 86,
    "releaseDate": "2024-03-15",
    "amazonUrl": {"com": "https://www.amazon.com/dp/B0F7NP", "uk": "https://www.amazon.co.uk/dp/B0F7NP"}
  },
  {
    "id": 2,
    "brand": "",
    "model": "VIOFO A119 Mini 2 1440p 60fps Dash Cam, 5GHz Wi-Fi, Supports up to 256GB",
    "price": {"amazon_com": 119.0},
    "rating": 4.4,
    "reviewCount": 3000,
    "popularity": 59,
    "structuredSpecs": {"voiceControl": "Supported"},
    "amazonUrl": {"com": "https://www.amazon.com/dp/B0A119"}
  },
  {
    "id": 3,
    "brand": "Garmin",
    "model": "Page Not Found",
    "price": {"amazon_com": 99.0}
  },
  {
    "id": 4,
    "brand": "Nextbase",
    "model": "Nextbase 322GW",
    "technicalDetails": "unavailable",
    "price": {"amazon_com": -1},
    "popularity": 40
  },
  {
    "id": "broken"
  }
]"#;

#[test]
fn test_process_save_load_filter() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("raw.json");
    let output = dir.path().join("out").join("products.json");
    std::fs::write(&input, RAW_PRODUCTS).unwrap();

    // the malformed record is skipped at load time
    let raws = load_raw_products(&input).unwrap();
    assert_eq!(raws.len(), 4);

    let processor = ProductProcessor::new(vec!["VIOFO".to_string()]).unwrap();
    let mut records = processor.process_all(&raws);

    // error page dropped, bad vendor field passed through untouched
    assert_eq!(records.len(), 3);
    let passed_through: Vec<&ProductRecord> = records
        .iter()
        .filter(|r| matches!(r, ProductRecord::Raw(_)))
        .collect();
    assert_eq!(passed_through.len(), 1);
    assert_eq!(passed_through[0], &ProductRecord::Raw(raws[3].clone()));

    save_catalog(&output, &mut records).unwrap();
    let loaded = load_catalog(&output).unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0].popularity(), 86);

    let products = normalized_products(loaded);
    assert_eq!(products.len(), 2);

    let redtiger = &products[0];
    assert_eq!(redtiger.specs.video.resolution, "4K");
    assert_eq!(redtiger.specs.physical.fov, 170);
    assert_eq!(redtiger.specs.physical.screen_size, Some(3.2));
    assert_eq!(redtiger.specs.physical.screen_type, "IPS");
    assert_eq!(redtiger.specs.physical.channels, 2);
    assert!(redtiger.specs.connectivity.wifi);
    assert!(redtiger.specs.connectivity.gps);
    assert!(redtiger.specs.video.night_vision);
    assert!(redtiger.specs.features.parking_mode);
    assert_eq!(redtiger.specs.storage.included_storage, Some(32.0));
    assert!(redtiger.specs.storage.memory_card_included);

    let viofo = &products[1];
    assert_eq!(viofo.product.brand, "VIOFO");
    assert_eq!(viofo.clean_model_name, "A119 Mini");
    assert_eq!(viofo.specs.video.resolution, "1440p");
    assert_eq!(viofo.specs.video.fps, 60);
    assert_eq!(viofo.specs.connectivity.wifi_frequency.as_deref(), Some("5GHz"));
    assert_eq!(viofo.specs.storage.max_storage, Some(256.0));
    assert!(viofo.specs.connectivity.voice_control);

    let state = FilterState {
        marketplace: Marketplace::AmazonUk,
        ..Default::default()
    };
    let uk = apply_filters(&products, &state);
    assert_eq!(uk.len(), 1);
    assert_eq!(uk[0].product.id, 1);

    let state = FilterState::default()
        .with_spec_tokens(["connectivity:gps", "physical:channels:2"])
        .unwrap();
    assert_eq!(apply_filters(&products, &state).len(), 1);

    let mut all = apply_filters(&products, &FilterState::default());
    sort_products(&mut all, SortKey::PriceLow, Marketplace::AmazonCom);
    let ids: Vec<u64> = all.iter().map(|p| p.product.id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[test]
fn test_processed_json_shape() {
    let raws: Vec<dashcam_finder::RawProduct> = serde_json::from_str(
        r#"[{"id": 7, "brand": "Vantrue", "model": "Vantrue N4 3 Channel 4K Dash Cam", "asin": "B0N4"}]"#,
    )
    .unwrap();
    let processor = ProductProcessor::new(vec![]).unwrap();
    let record = processor.process(&raws[0]).unwrap();

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["asin"], "B0N4");
    assert_eq!(json["specs"]["physical"]["channels"], 3);
    assert_eq!(json["specs"]["physical"]["screenSize"], serde_json::Value::Null);
    assert_eq!(json["cleanModelName"], "N4 3");
    assert_eq!(
        json["extractionMetadata"]["sourcesUsed"]["video"]["resolution"]["source"],
        "model"
    );
    assert!(json["extractionMetadata"]["processingTimestamp"].is_string());
}
