use std::io::Write;

use super::*;

#[test]
fn defaults_resolve_to_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.server.route, "/og-image");
    assert_eq!(settings.metadata.path, PathBuf::from("public/og-metadata.json"));
    assert_eq!(settings.metadata.fallback, "default");
    assert_eq!(settings.render.program, PathBuf::from("og-render"));
    assert!(settings.render.args.is_empty());
    assert_eq!(settings.render.timeout, Duration::from_secs(30));
    assert_eq!(settings.store.backend, StoreBackend::Memory);
    assert_eq!(settings.store.memory_limit.get(), 512);
    assert_eq!(settings.store.ttl, Duration::from_secs(31_536_000));
    assert_eq!(settings.response.max_age.get(), 3600);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.render.brand = Some("From file".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        pipeline: PipelineOverrides {
            render_brand: Some("From CLI".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.render.brand, "From CLI");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn store_backend_parses_case_insensitively() {
    let mut raw = RawSettings::default();
    raw.store.backend = Some("FileSystem".to_string());
    raw.store.directory = Some(PathBuf::from("/var/cache/og"));

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.store.backend, StoreBackend::Filesystem);
    assert_eq!(settings.store.directory, PathBuf::from("/var/cache/og"));
}

#[test]
fn unknown_store_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.store.backend = Some("redis".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid backend");
    assert!(matches!(err, LoadError::Invalid { key: "store.backend", .. }));
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.store.ttl_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(err, LoadError::Invalid { key: "store.ttl_seconds", .. }));

    let mut raw = RawSettings::default();
    raw.store.memory_limit = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero limit");
    assert!(matches!(err, LoadError::Invalid { key: "store.memory_limit", .. }));

    let mut raw = RawSettings::default();
    raw.render.timeout_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero timeout");
    assert!(matches!(err, LoadError::Invalid { key: "render.timeout_seconds", .. }));

    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero port");
    assert!(matches!(err, LoadError::Invalid { key: "server.port", .. }));
}

#[test]
fn route_must_be_absolute() {
    let mut raw = RawSettings::default();
    raw.server.route = Some("og-image".to_string());

    let err = Settings::from_raw(raw).expect_err("relative route");
    assert!(matches!(err, LoadError::Invalid { key: "server.route", .. }));
}

#[test]
fn blank_fallback_marker_is_rejected() {
    let mut raw = RawSettings::default();
    raw.metadata.fallback = Some("  ".to_string());

    let err = Settings::from_raw(raw).expect_err("blank marker");
    assert!(matches!(err, LoadError::Invalid { key: "metadata.fallback", .. }));
}

#[test]
fn config_file_layer_is_applied() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    writeln!(
        file,
        r#"
[render]
brand = "Example | Notes"
args = ["--theme", "dark"]

[store]
backend = "filesystem"
directory = "/tmp/og"
"#
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "ogcache",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
        "warm",
        "--store-directory",
        "/srv/og",
    ]);
    let settings = load(&args).expect("settings");

    assert_eq!(settings.render.brand, "Example | Notes");
    assert_eq!(settings.render.args, vec!["--theme", "dark"]);
    assert_eq!(settings.store.backend, StoreBackend::Filesystem);
    assert_eq!(settings.store.directory, PathBuf::from("/srv/og"));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["ogcache"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "ogcache",
        "render",
        "--metadata-path",
        "dist/og.json",
        "/blog/foo",
        "/tmp/foo.png",
    ]);

    match args.command.expect("render command") {
        Command::Render(render) => {
            assert_eq!(render.identifier, "/blog/foo");
            assert_eq!(render.output, std::path::Path::new("/tmp/foo.png"));
            assert_eq!(
                render.overrides.metadata_path.as_deref(),
                Some(std::path::Path::new("dist/og.json"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_warm_arguments() {
    let args = CliArgs::parse_from(["ogcache", "warm", "--concurrency", "8"]);

    match args.command.expect("warm command") {
        Command::Warm(warm) => assert_eq!(warm.concurrency, 8),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "ogcache",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--store-backend",
        "filesystem",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.pipeline.store_backend.as_deref(),
                Some("filesystem")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
