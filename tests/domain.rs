use job_file_search::domain::{FileResult, Limit, SearchFilters, TypeSelection};
use job_file_search::normalize::{StyleKey, display_category, display_name, download_name};
use job_file_search::query::{encode_search, to_query_string};

#[test]
fn backend_rows_render_without_filename() {
    // `/search` does not select `filename`; `/material_usage` does.
    let raw = r#"[
        {"id": 11, "job_name": "Expo Stand", "job_id": "24-118", "resource_type": "print_files", "abs_path": "/mnt/jobs/24-118/print/panel_a.pdf"},
        {"id": 12, "job_id": "24-118", "job_name": null, "resource_type": "MU_SHEET", "abs_path": "\\\\nas\\jobs\\24-118\\mu.xlsx", "filename": "mu.xlsx"}
    ]"#;
    let results: Vec<FileResult> = serde_json::from_str(raw).unwrap();

    assert_eq!(display_name(&results[0]), "panel_a.pdf");
    assert_eq!(display_category(&results[0]).style, StyleKey::Blue);
    assert_eq!(display_name(&results[1]), "mu.xlsx");
    assert_eq!(display_category(&results[1]).label, "MU_SHEET");
    assert_eq!(display_category(&results[1]).style, StyleKey::Orange);
}

#[test]
fn download_name_without_any_name() {
    let record = FileResult {
        id: 77,
        job_id: "24-001".to_string(),
        resource_type: "pics".to_string(),
        abs_path: String::new(),
        job_name: None,
        filename: None,
    };
    assert_eq!(display_name(&record), "Unknown");
    assert_eq!(download_name(&record), "file_77");
}

#[test]
fn banner_search_query() {
    let mut types = TypeSelection::new();
    types.add("cut_file");
    types.add("pics");
    types.add("cut_file");
    let filters = SearchFilters {
        name: Some("banner".to_string()),
        types,
        limit: Limit::new(50).unwrap(),
        ..SearchFilters::default()
    };

    let query = to_query_string(&encode_search(&filters));

    assert_eq!(query, "name=banner&type=cut_file&type=pics&limit=50");
    assert!(!query.contains("id="));
    assert!(!query.contains("year="));
}

#[test]
fn filters_deserialize_with_set_semantics() {
    let raw = r#"{"name": "banner", "types": ["pics", "pics", "low_res"], "limit": 20}"#;
    let filters: SearchFilters = serde_json::from_str(raw).unwrap();
    assert_eq!(filters.types.len(), 2);
    assert_eq!(filters.limit.get(), 20);

    let raw = r#"{"limit": 5000}"#;
    assert!(serde_json::from_str::<SearchFilters>(raw).is_err());
}
