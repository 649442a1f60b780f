//! Loading configuration the way the binaries do.

use std::io::Write;

#[test]
fn explicit_missing_path_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = fakeblok::load_config(Some(&dir.path().join("none.toml"))).unwrap();
    assert_eq!(config.server().port, 5000);
    assert_eq!(config.registry().list_port, 5002);
}

#[test]
fn explicit_path_is_read() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[server]\nport = 6100\nname = \"lobby\"\n\n[registry]\nmax_failed_pings = 5"
    )
    .unwrap();

    let config = fakeblok::load_config(Some(file.path())).unwrap();
    let server = config.server();
    assert_eq!(server.port, 6100);
    assert_eq!(server.name.as_deref(), Some("lobby"));
    assert_eq!(config.registry().max_failed_pings, 5);
}

#[test]
fn invalid_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nport = \"high\"").unwrap();
    let err = fakeblok::load_config(Some(file.path())).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config"), "{err:#}");
}
