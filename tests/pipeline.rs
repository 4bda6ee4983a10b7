use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;

use gable_lib::build::{
    ArtifactSink, BuildConfig, BuildOrchestrator, BuildOutcome, BuildStage, BuildTarget, MemorySink,
};
use gable_lib::compile::TargetFilter;
use gable_lib::export::{decode_json, serializer_for, OutputFormat};
use gable_lib::sheet::{Sheet, SheetGrid, SheetKind};
use gable_lib::{CancelToken, ErrorKind};

fn sheet(name: &str, kind: SheetKind, rows: Vec<Vec<&str>>) -> Sheet {
    Sheet::new(name, kind, SheetGrid::from_text_rows(rows))
}

fn player_type_enum() -> Sheet {
    sheet(
        "EPlayerType",
        SheetKind::Enum,
        vec![
            vec!["field", "value", "desc"],
            vec!["None", "0", ""],
            vec!["Normal", "1", "Regular player"],
            vec!["Special", "2", ""],
        ],
    )
}

fn player(rows: Vec<Vec<&str>>) -> Sheet {
    let mut all = vec![
        vec!["Id", "Name", "Type"],
        vec!["id", "name", "type"],
        vec!["int", "string", "enum(EPlayerType)"],
        vec!["", "", ""],
        vec!["", "", ""],
    ];
    all.extend(rows);
    sheet("Player", SheetKind::Data, all)
}

fn run(targets: Vec<BuildTarget>, sheets: Vec<Sheet>) -> (BuildOutcome, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = BuildOrchestrator::new(BuildConfig::new(targets), sink.clone());
    (orchestrator.run(sheets), sink)
}

fn json_target(name: &str, platform: &str) -> BuildTarget {
    BuildTarget::new(name, "csharp", "json", format!("out/{}", name)).with_platform(platform)
}

#[test]
fn test_enum_field_resolves_to_values() {
    let (outcome, sink) = run(
        vec![json_target("all", "*")],
        vec![
            player(vec![vec!["1001", "Hero", "Normal"], vec!["1002", "Villain", "Special"]]),
            player_type_enum(),
        ],
    );

    assert!(outcome.report.is_success(), "{:?}", outcome.report.diagnostics);
    assert_eq!(
        sink.text("out/all/Player.json").unwrap(),
        r#"[
  {
    "id": 1001,
    "name": "Hero",
    "type": 1
  },
  {
    "id": 1002,
    "name": "Villain",
    "type": 2
  }
]
"#
    );
}

#[test]
fn test_kv_sheet_yields_single_record() {
    let kv = sheet(
        "GameConst",
        SheetKind::Kv,
        vec![
            vec!["field", "type", "platform", "value", "desc"],
            vec!["map_height", "float", "", "12.5", "desc"],
        ],
    );
    let (outcome, sink) = run(vec![json_target("all", "*")], vec![kv]);

    assert!(outcome.report.is_success(), "{:?}", outcome.report.diagnostics);
    assert_eq!(sink.text("out/all/GameConst.json").unwrap(), "{\n  \"map_height\": 12.5\n}\n");

    let table = outcome.registry.table("GameConst").unwrap();
    assert_eq!(table.records.len(), 1);
    assert_eq!(table.schema.fields.len(), 1);
}

#[test]
fn test_platform_restricted_field_follows_target() {
    let monster = sheet(
        "Monster",
        SheetKind::Data,
        vec![
            vec!["", "", ""],
            vec!["id", "hp", "model"],
            vec!["int", "int", "string"],
            vec!["client", "server", "client"],
            vec!["", "", ""],
            vec!["1", "300", "slime.fbx"],
        ],
    );
    let (outcome, sink) = run(
        vec![json_target("server", "server"), json_target("client", "client")],
        vec![monster],
    );
    assert!(outcome.report.is_success(), "{:?}", outcome.report.diagnostics);

    let server = sink.text("out/server/Monster.json").unwrap();
    let client = sink.text("out/client/Monster.json").unwrap();
    assert!(server.contains("\"hp\": 300"));
    assert!(!server.contains("model"));
    assert!(!client.contains("\"hp\""));
    assert!(client.contains("\"model\": \"slime.fbx\""));
    // The key is kept for every platform
    assert!(server.contains("\"id\": 1"));
    assert!(client.contains("\"id\": 1"));
}

#[test]
fn test_duplicate_key_reports_second_row() {
    let (outcome, _) = run(
        vec![],
        vec![
            player(vec![
                vec!["1001", "Hero", "Normal"],
                vec!["1002", "Villain", "Special"],
                vec!["1001", "Copy", "Normal"],
            ]),
            player_type_enum(),
        ],
    );

    assert_eq!(outcome.report.stage, BuildStage::Failed);
    let diag = &outcome.report.diagnostics[0];
    assert_eq!(diag.kind, ErrorKind::DuplicateKey);
    assert_eq!(diag.table.as_deref(), Some("Player"));
    let location = diag.location.as_ref().unwrap();
    assert_eq!((location.row, location.column), (Some(7), Some(0)));
    assert!(outcome.registry.table("Player").is_none());
    assert!(outcome.registry.enum_table("EPlayerType").is_some());
}

#[test]
fn test_unknown_enum_symbol_is_unresolved() {
    let (outcome, _) = run(
        vec![],
        vec![player(vec![vec!["1001", "Hero", "Heroic"]]), player_type_enum()],
    );

    let diag = &outcome.report.diagnostics[0];
    assert_eq!(diag.kind, ErrorKind::UnresolvedReference);
    assert_eq!(diag.location.as_ref().unwrap().to_string(), "Player!C6");
}

#[test]
fn test_json_round_trip_matches_records() {
    let items = sheet(
        "Item",
        SheetKind::Data,
        vec![
            vec!["", "", "", "", "", ""],
            vec!["*id", "*level", "kind", "offset", "rates", "tags"],
            vec!["int", "int", "enum(EPlayerType)", "vector3", "%[]", "string[]"],
            vec!["", "", "", "", "", ""],
            vec!["", "", "", "", "", ""],
            vec!["1", "1", "Normal", "1,2.5,-3", "50%,12.5%", "a,b"],
            vec!["1", "2", "", "", "", ""],
            vec!["2", "1", "2", "(0,0,1)", "5%", "c"],
        ],
    );
    let (outcome, _) = run(vec![], vec![items, player_type_enum()]);
    assert!(outcome.report.is_success(), "{:?}", outcome.report.diagnostics);

    let table = outcome.registry.table("Item").unwrap();
    let schema = TargetFilter::for_tag("*").project(&table.schema);
    let bytes = serializer_for(OutputFormat::Json)
        .serialize(&schema, &table.records)
        .unwrap();
    let decoded = decode_json(&bytes, &schema, &outcome.registry).unwrap();

    let built: Vec<_> = table.records.iter().map(|r| r.values.clone()).collect();
    assert_eq!(decoded, built);
}

#[test]
fn test_output_is_deterministic() {
    let sheets = || {
        vec![
            player(vec![vec!["1001", "Hero", "Normal"], vec!["1002", "Villain", "Special"]]),
            player_type_enum(),
        ]
    };
    let targets = || {
        OutputFormat::ALL
            .iter()
            .map(|f| BuildTarget::new(f.to_string(), "go", f.to_string(), format!("out/{}", f)))
            .collect::<Vec<_>>()
    };

    let (first, first_sink) = run(targets(), sheets());
    let (second, second_sink) = run(targets(), sheets());
    assert!(first.report.is_success());
    assert_eq!(first_sink.paths(), second_sink.paths());
    for path in first_sink.paths() {
        assert_eq!(first_sink.get(&path), second_sink.get(&path), "{}", path.display());
    }
    let digests = |o: &BuildOutcome| -> Vec<String> {
        o.report.artifacts.iter().map(|a| a.sha256.clone()).collect()
    };
    assert_eq!(digests(&first), digests(&second));
}

#[test]
fn test_link_cycle_is_rejected() {
    let a = sheet(
        "TableA",
        SheetKind::Data,
        vec![
            vec!["", ""],
            vec!["id", "b"],
            vec!["int", "int"],
            vec!["", ""],
            vec!["", "TableB.id"],
            vec!["1", "1"],
        ],
    );
    let b = sheet(
        "TableB",
        SheetKind::Data,
        vec![
            vec!["", ""],
            vec!["id", "a"],
            vec!["int", "int"],
            vec!["", ""],
            vec!["", "TableA.id"],
            vec!["1", "1"],
        ],
    );
    let (outcome, _) = run(vec![], vec![a, b]);

    let failed: Vec<_> = outcome
        .report
        .diagnostics
        .iter()
        .map(|d| (d.table.clone().unwrap_or_default(), d.kind))
        .collect();
    assert_eq!(
        failed,
        vec![
            ("TableA".to_string(), ErrorKind::UnresolvedReference),
            ("TableB".to_string(), ErrorKind::UnresolvedReference),
        ]
    );
    assert!(outcome.registry.is_empty());
}

#[test]
fn test_links_resolve_across_tables() {
    let item = sheet(
        "Item",
        SheetKind::Data,
        vec![
            vec!["", ""],
            vec!["id", "name"],
            vec!["int", "string"],
            vec!["", ""],
            vec!["", ""],
            vec!["1", "Sword"],
        ],
    );
    let shop = |item_id: &str| {
        sheet(
            "Shop",
            SheetKind::Data,
            vec![
                vec!["", ""],
                vec!["id", "item"],
                vec!["int", "int"],
                vec!["", ""],
                vec!["", "Item.id"],
                vec!["10", item_id],
            ],
        )
    };

    let (outcome, _) = run(vec![], vec![shop("1"), item.clone()]);
    assert!(outcome.report.is_success(), "{:?}", outcome.report.diagnostics);

    let (outcome, _) = run(vec![], vec![shop("7"), item]);
    let diag = &outcome.report.diagnostics[0];
    assert_eq!(diag.kind, ErrorKind::UnresolvedReference);
    assert_eq!(diag.table.as_deref(), Some("Shop"));
}

#[test]
fn test_invalid_target_only_fails_itself() {
    let mut missing_code = BuildTarget::new("nocode", "lua", "json", "out/nocode");
    missing_code.generate_code = true;
    let (outcome, sink) = run(
        vec![
            missing_code,
            BuildTarget::new("xml", "lua", "xml", "out/xml"),
            BuildTarget::new("ok", "lua", "csv", "out/ok"),
        ],
        vec![player(vec![vec!["1001", "Hero", "Normal"]]), player_type_enum()],
    );

    let targets: Vec<_> = outcome
        .report
        .diagnostics
        .iter()
        .map(|d| (d.target.clone().unwrap_or_default(), d.kind))
        .collect();
    assert_eq!(
        targets,
        vec![
            ("nocode".to_string(), ErrorKind::TargetConfig),
            ("xml".to_string(), ErrorKind::TargetConfig),
        ]
    );
    assert!(sink.get("out/ok/Player.csv").is_some());
    assert!(outcome.registry.table("Player").is_some());
}

#[test]
fn test_cancelled_run_reports_cancellation() {
    let token = CancelToken::new();
    let sink = Arc::new(MemorySink::new());
    let orchestrator = BuildOrchestrator::new(BuildConfig::new(vec![json_target("all", "*")]), sink.clone())
        .with_cancel(token.clone());
    token.cancel();

    let outcome = orchestrator.run(vec![player_type_enum()]);
    assert!(outcome.report.cancelled);
    assert_eq!(outcome.report.diagnostics.len(), 1);
    assert_eq!(outcome.report.diagnostics[0].kind, ErrorKind::Cancelled);
    assert!(sink.is_empty());
}

/// Keeps every write and cancels the run after the first one
struct CancelAfterFirstWrite {
    inner: MemorySink,
    token: CancelToken,
}

impl ArtifactSink for CancelAfterFirstWrite {
    fn write(&self, path: &Path, bytes: &[u8]) -> gable_lib::Result<()> {
        self.inner.write(path, bytes)?;
        self.token.cancel();
        Ok(())
    }
}

#[test]
fn test_cancel_during_export_skips_remaining_jobs() {
    let token = CancelToken::new();
    let sink = Arc::new(CancelAfterFirstWrite {
        inner: MemorySink::new(),
        token: token.clone(),
    });
    let mut with_code = json_target("all", "*");
    with_code.generate_code = true;
    with_code.code_path = Some("out/code".into());
    let mut config = BuildConfig::new(vec![with_code, json_target("second", "*")]);
    config.jobs = Some(1);

    let monster = sheet(
        "Monster",
        SheetKind::Data,
        vec![
            vec!["", ""],
            vec!["id", "hp"],
            vec!["int", "int"],
            vec!["", ""],
            vec!["", ""],
            vec!["1", "300"],
        ],
    );
    let orchestrator = BuildOrchestrator::new(config, sink.clone()).with_cancel(token);
    let outcome = orchestrator.run(vec![
        player(vec![vec!["1001", "Hero", "Normal"]]),
        monster,
        player_type_enum(),
    ]);

    assert!(outcome.report.cancelled);
    assert!(!outcome.report.is_success());
    assert_eq!(outcome.report.stage, BuildStage::Failed);
    let kinds: Vec<_> = outcome.report.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::Cancelled]);

    // Only the first data file made it out; its code, the other tables and the second
    // target were never written
    assert_eq!(sink.inner.len(), 1);
    let written = sink.inner.paths();
    assert!(written[0].starts_with("out/all"), "{}", written[0].display());
    assert!(written[0].extension().is_some_and(|ext| ext == "json"));
    assert_eq!(outcome.report.artifacts.len(), 1);
    assert_eq!(outcome.report.artifacts[0].path, written[0]);
}
