use std::path::Path;

use semver::Version;

use super::*;

struct NoopAction {
    id: &'static str,
    phase: Phase,
}

impl Action for NoopAction {
    fn id(&self) -> &str {
        self.id
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn run(
        &mut self,
        _ctx: &ActionContext<'_>,
        _product: &mut Product,
        _mode: &Mode,
        _monitor: &mut dyn ProgressMonitor,
    ) -> Result<(), ActionError> {
        Ok(())
    }
}

#[test]
fn parse_install_description() {
    let content = r#"
product_id = "com.example.studio"
product_name = "Example Studio"
product_version = "2.1.0"
uninstall_name = "Example Studio 2.1"
root_location = "/opt/example/studio"
excluded_actions = ["shortcuts"]
uninstall_files = ["instill:uninstall", "uninstall.sh"]

[[units]]
id = "com.example.studio.ide"
version = "2.1.0.20260801"

[[requires]]
id = "com.example.studio"
range = "^2.0"

[uninstall]
remove_directories = true
show_uninstall = true

[properties]
channel = "stable"
"#;

    let parsed = InstallDescription::from_toml_str(content).expect("description should parse");
    assert_eq!(parsed.product_id, "com.example.studio");
    assert_eq!(parsed.product_version.to_string(), "2.1.0");
    assert_eq!(parsed.uninstall_display_name(), "Example Studio 2.1");
    assert_eq!(parsed.units.len(), 1);
    assert_eq!(parsed.excluded_actions, vec!["shortcuts"]);
    assert_eq!(parsed.requires[0].id, "com.example.studio");
    assert_eq!(parsed.properties.get("channel").map(String::as_str), Some("stable"));
    assert_eq!(
        parsed.engine_location(),
        Path::new("/opt/example/studio/engine")
    );
}

#[test]
fn description_defaults_uninstall_name_to_product_name() {
    let content = r#"
product_id = "tool"
product_name = "Tool"
product_version = "1.0.0"
root_location = "/opt/tool"
"#;

    let parsed = InstallDescription::from_toml_str(content).expect("description should parse");
    assert_eq!(parsed.uninstall_display_name(), "Tool");
    assert!(parsed.uninstall_files.is_empty());
    assert!(parsed.uninstall.is_none());
}

#[test]
fn description_rejects_relative_root_location() {
    let content = r#"
product_id = "tool"
product_name = "Tool"
product_version = "1.0.0"
root_location = "opt/tool"
"#;

    let err = InstallDescription::from_toml_str(content).expect_err("must reject relative root");
    assert!(err.to_string().contains("root_location must be absolute"));
}

#[test]
fn description_rejects_escaping_uninstall_files() {
    let content = r#"
product_id = "tool"
product_name = "Tool"
product_version = "1.0.0"
root_location = "/opt/tool"
uninstall_files = ["../instill"]
"#;

    let err = InstallDescription::from_toml_str(content).expect_err("must reject parent path");
    let text = format!("{err:#}");
    assert!(text.contains("must not include '..'"), "unexpected error: {text}");
}

#[test]
fn phases_order_ascending() {
    assert!(Phase::PreInstall < Phase::Install);
    assert!(Phase::Install < Phase::PostInstall);
    assert_eq!(Phase::PreInstall.as_str(), "pre-install");
}

#[test]
fn mode_flags_respect_operation() {
    let install = Mode::install().upgrading();
    assert!(install.is_install() && install.is_upgrade());
    assert!(!install.is_update());

    // Upgrade flag has no meaning for an uninstall.
    let uninstall = Mode::uninstall().upgrading();
    assert!(!uninstall.is_upgrade());

    let root = Mode::uninstall().root_uninstalling();
    assert!(root.is_root_uninstall());
    assert!(!Mode::install().root_uninstalling().is_root_uninstall());
}

#[test]
fn patch_mode_implies_update() {
    let mode = Mode::patch();
    assert!(mode.is_patch());
    assert!(mode.is_update());
    assert!(mode.is_install());
}

#[test]
fn rollback_mode_keeps_flags() {
    let mode = Mode::install().upgrading().to_uninstall();
    assert!(mode.is_uninstall());
    assert!(mode.is_upgrade());
}

#[test]
fn product_identity_is_by_id() {
    let one = Product::new(
        "tool",
        "Tool",
        Version::new(1, 0, 0),
        "Tool",
        "/opt/tool",
        "/opt/tool/engine",
    );
    let two = Product::new(
        "tool",
        "Other Name",
        Version::new(2, 0, 0),
        "Other",
        "/srv/tool",
        "/srv/tool/engine",
    );
    assert_eq!(one, two);
}

#[test]
fn product_units_deduplicate() {
    let mut product = Product::new(
        "tool",
        "Tool",
        Version::new(1, 0, 0),
        "Tool",
        "/opt/tool",
        "/opt/tool/engine",
    );
    product.add_unit(InstallUnit::new("com.example.ide", "1.0.0"));
    product.add_unit(InstallUnit::new("com.example.ide", "1.0.0"));
    assert_eq!(product.units().len(), 1);
}

#[test]
fn install_unit_qualified_round_trip() {
    let unit = InstallUnit::new("com.example.ide", "2.1.0.v20260801");
    let parsed = InstallUnit::parse(&unit.qualified()).expect("must parse qualified id");
    assert_eq!(parsed, unit);

    assert!(InstallUnit::parse("no-version").is_err());
    assert!(InstallUnit::parse("@1.0").is_err());
}

#[test]
fn product_status_round_trip() {
    assert_eq!(
        ProductStatus::parse(ProductStatus::Installed.as_str()).expect("must parse"),
        ProductStatus::Installed
    );
    assert_eq!(
        ProductStatus::parse(ProductStatus::PartiallyInstalled.as_str()).expect("must parse"),
        ProductStatus::PartiallyInstalled
    );
    assert!(ProductStatus::parse("unknown").is_err());
}

#[test]
fn registry_creates_registered_actions_only() {
    let mut registry = ActionRegistry::new();
    registry.register("noop", || {
        Box::new(NoopAction {
            id: "noop",
            phase: Phase::Install,
        })
    });

    let action = registry.create("noop").expect("must create noop action");
    assert_eq!(action.id(), "noop");
    assert_eq!(action.progress_weight(), DEFAULT_PROGRESS_WEIGHT);
    assert!(action.remove_on_upgrade());
    assert!(registry.create("missing").is_none());
    assert!(registry.contains("noop"));
}
