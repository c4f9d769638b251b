use figment::{
    providers::{Format, Toml},
    Figment,
};

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_astpk() {
    let mut config = Figment::new();
    config = config.merge(Toml::file_exact("tests/data/astpk.toml"));
    let driver: mzascorer::MZAScorer = config.extract().unwrap();
    assert_eq!(driver.threads, 2);
    assert_eq!(driver.max_permutations, 16384);
    assert!(driver.depth_weights.is_empty());
    driver.main().unwrap();
}
