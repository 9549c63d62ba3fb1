use std::path::{Path, PathBuf};

use log::{info, warn};
use toml::{Table, Value};

use super::{ConfigError, DEFAULT_SECRET_FILE, FORWARDING_SECRET_LENGTH, generate_secret};

/// Schema version assumed for documents without a `config-version` key.
const BASE_VERSION: (u64, u64) = (1, 0);

/// One step of the append-only schema evolution pipeline.
///
/// New migrations are appended to [`chain`] with a target version strictly
/// greater than their predecessor's; existing entries are never reordered.
trait Migration {
    /// Version this migration brings the document up to.
    fn target_version(&self) -> &'static str;

    /// True precisely while the document is below the target version.
    fn should_migrate(&self, document: &Table) -> bool {
        let target = parse_version(self.target_version())
            .expect("migration target versions are literals");
        document_version(document) < target
    }

    fn migrate(&self, document: &mut Table) -> Result<(), ConfigError>;
}

fn parse_version(version: &str) -> Option<(u64, u64)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn document_version(document: &Table) -> (u64, u64) {
    document
        .get("config-version")
        .and_then(Value::as_str)
        .and_then(parse_version)
        .unwrap_or(BASE_VERSION)
}

fn chain(directory: &Path) -> [Box<dyn Migration>; 5] {
    [
        Box::new(ForwardingMigration {
            secret_path: directory.join(DEFAULT_SECRET_FILE),
        }),
        Box::new(KeyAuthenticationMigration),
        Box::new(MotdMigration),
        Box::new(TransferIntegrationMigration),
        Box::new(LittleSkinAuthenticationMigration),
    ]
}

/// Bring `document` forward to the current schema. Returns whether any
/// migration fired, so the caller knows to write the document back.
pub(crate) fn run(document: &mut Table, directory: &Path) -> Result<bool, ConfigError> {
    let mut migrated = false;
    for migration in chain(directory) {
        if migration.should_migrate(document) {
            info!(
                "Migrating configuration to version {}",
                migration.target_version()
            );
            migration.migrate(document)?;
            document.insert(
                "config-version".to_owned(),
                Value::String(migration.target_version().to_owned()),
            );
            migrated = true;
        }
    }
    Ok(migrated)
}

/// 1.x configurations stored the forwarding secret inline; move it into
/// the secret file and leave only the file reference behind.
struct ForwardingMigration {
    secret_path: PathBuf,
}

impl Migration for ForwardingMigration {
    fn target_version(&self) -> &'static str {
        "2.0"
    }

    fn migrate(&self, document: &mut Table) -> Result<(), ConfigError> {
        let secret = match document.remove("forwarding-secret") {
            Some(Value::String(secret)) if !secret.is_empty() => secret,
            _ => generate_secret(FORWARDING_SECRET_LENGTH),
        };
        if !self.secret_path.exists() {
            std::fs::write(&self.secret_path, secret)?;
        }
        document.insert(
            "forwarding-secret-file".to_owned(),
            Value::String(DEFAULT_SECRET_FILE.to_owned()),
        );
        Ok(())
    }
}

struct KeyAuthenticationMigration;

impl Migration for KeyAuthenticationMigration {
    fn target_version(&self) -> &'static str {
        "2.5"
    }

    fn migrate(&self, document: &mut Table) -> Result<(), ConfigError> {
        document
            .entry("force-key-authentication")
            .or_insert(Value::Boolean(true));
        Ok(())
    }
}

/// Rewrites legacy `&`/`§`-coded and JSON motds into MiniMessage.
struct MotdMigration;

impl Migration for MotdMigration {
    fn target_version(&self) -> &'static str {
        "2.6"
    }

    fn migrate(&self, document: &mut Table) -> Result<(), ConfigError> {
        let Some(Value::String(motd)) = document.get("motd") else {
            return Ok(());
        };
        if let Some(migrated) = migrate_motd(motd) {
            document.insert("motd".to_owned(), Value::String(migrated));
        }
        Ok(())
    }
}

fn migrate_motd(motd: &str) -> Option<String> {
    if motd.trim_start().starts_with('{') {
        let Ok(component) = serde_json::from_str::<serde_json::Value>(motd) else {
            warn!("Could not parse JSON motd {motd:?}, leaving it as-is");
            return None;
        };
        return component
            .get("text")
            .and_then(serde_json::Value::as_str)
            .map(translate_legacy_codes);
    }
    if motd.contains('&') || motd.contains('§') {
        return Some(translate_legacy_codes(motd));
    }
    None
}

fn translate_legacy_codes(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' || c == '§' {
            if let Some(tag) = chars.peek().copied().and_then(legacy_tag) {
                output.push_str(tag);
                chars.next();
                continue;
            }
        }
        output.push(c);
    }
    output
}

fn legacy_tag(code: char) -> Option<&'static str> {
    Some(match code.to_ascii_lowercase() {
        '0' => "<black>",
        '1' => "<dark_blue>",
        '2' => "<dark_green>",
        '3' => "<dark_aqua>",
        '4' => "<dark_red>",
        '5' => "<dark_purple>",
        '6' => "<gold>",
        '7' => "<gray>",
        '8' => "<dark_gray>",
        '9' => "<blue>",
        'a' => "<green>",
        'b' => "<aqua>",
        'c' => "<red>",
        'd' => "<light_purple>",
        'e' => "<yellow>",
        'f' => "<white>",
        'k' => "<obfuscated>",
        'l' => "<bold>",
        'm' => "<strikethrough>",
        'n' => "<underlined>",
        'o' => "<italic>",
        'r' => "<reset>",
        _ => return None,
    })
}

struct TransferIntegrationMigration;

impl Migration for TransferIntegrationMigration {
    fn target_version(&self) -> &'static str {
        "2.7"
    }

    fn migrate(&self, document: &mut Table) -> Result<(), ConfigError> {
        document
            .entry("accepts-transfers")
            .or_insert(Value::Boolean(false));
        Ok(())
    }
}

struct LittleSkinAuthenticationMigration;

impl Migration for LittleSkinAuthenticationMigration {
    fn target_version(&self) -> &'static str {
        "2.8"
    }

    fn migrate(&self, document: &mut Table) -> Result<(), ConfigError> {
        let authentication = document
            .entry("authentication")
            .or_insert_with(|| Value::Table(Table::new()));
        let Some(authentication) = authentication.as_table_mut() else {
            warn!("Configuration key \"authentication\" is not a table, leaving it alone");
            return Ok(());
        };
        authentication
            .entry("enable-littleskin")
            .or_insert(Value::Boolean(true));
        authentication
            .entry("littleskin-whitelist")
            .or_insert(Value::Array(Vec::new()));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{super::test::scratch_directory, *};

    fn document(source: &str) -> Table {
        toml::from_str(source).unwrap()
    }

    #[test]
    fn targets_are_strictly_increasing() {
        let directory = scratch_directory("ordering");
        let targets: Vec<(u64, u64)> = chain(&directory)
            .iter()
            .map(|migration| parse_version(migration.target_version()).unwrap())
            .collect();
        assert!(targets.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn chain_is_idempotent() {
        let directory = scratch_directory("idempotent");
        let mut doc = document(
            concat!(
                "config-version = \"1.0\"\n",
                "motd = \"&6Gold rush\"\n",
                "forwarding-secret = \"hunter2hunter\"\n",
            ),
        );
        assert!(run(&mut doc, &directory).unwrap());
        let once = doc.clone();
        assert!(!run(&mut doc, &directory).unwrap());
        assert_eq!(doc, once);
    }

    #[test]
    fn littleskin_migration_from_2_7() {
        let directory = scratch_directory("littleskin");
        let mut doc = document("config-version = \"2.7\"\n");
        assert!(run(&mut doc, &directory).unwrap());

        assert_eq!(
            doc.get("config-version").and_then(Value::as_str),
            Some("2.8")
        );
        let authentication = doc.get("authentication").unwrap().as_table().unwrap();
        assert_eq!(
            authentication.get("enable-littleskin"),
            Some(&Value::Boolean(true))
        );
        assert_eq!(
            authentication.get("littleskin-whitelist"),
            Some(&Value::Array(Vec::new()))
        );
        // 2.7 documents already carry the earlier keys; those migrations
        // must not have fired.
        assert!(!doc.contains_key("forwarding-secret-file"));
    }

    #[test]
    fn littleskin_migration_keeps_user_values() {
        let directory = scratch_directory("littleskin-user");
        let mut doc = document(
            concat!(
                "config-version = \"2.7\"\n",
                "[authentication]\n",
                "enable-littleskin = false\n",
                "littleskin-whitelist = [\"Notch\"]\n",
            ),
        );
        run(&mut doc, &directory).unwrap();
        let authentication = doc.get("authentication").unwrap().as_table().unwrap();
        assert_eq!(
            authentication.get("enable-littleskin"),
            Some(&Value::Boolean(false))
        );
        assert_eq!(
            authentication.get("littleskin-whitelist"),
            Some(&Value::Array(vec![Value::String("Notch".to_owned())]))
        );
    }

    #[test]
    fn forwarding_migration_moves_inline_secret() {
        let directory = scratch_directory("forwarding");
        let mut doc = document(
            concat!(
                "config-version = \"1.0\"\n",
                "forwarding-secret = \"hunter2hunter\"\n",
            ),
        );
        run(&mut doc, &directory).unwrap();

        assert!(!doc.contains_key("forwarding-secret"));
        assert_eq!(
            doc.get("forwarding-secret-file").and_then(Value::as_str),
            Some(DEFAULT_SECRET_FILE)
        );
        let secret = std::fs::read_to_string(directory.join(DEFAULT_SECRET_FILE)).unwrap();
        assert_eq!(secret, "hunter2hunter");
        // The whole chain ran, so the document ends on the current schema.
        assert_eq!(
            doc.get("config-version").and_then(Value::as_str),
            Some("2.8")
        );
        assert_eq!(
            doc.get("force-key-authentication"),
            Some(&Value::Boolean(true))
        );
        assert_eq!(doc.get("accepts-transfers"), Some(&Value::Boolean(false)));
    }

    #[test]
    fn forwarding_migration_without_inline_secret_generates_one() {
        let directory = scratch_directory("forwarding-generated");
        let mut doc = document("config-version = \"1.0\"\n");
        run(&mut doc, &directory).unwrap();
        let secret = std::fs::read_to_string(directory.join(DEFAULT_SECRET_FILE)).unwrap();
        assert_eq!(secret.len(), FORWARDING_SECRET_LENGTH);
    }

    #[test]
    fn up_to_date_documents_are_untouched() {
        let directory = scratch_directory("current");
        let mut doc = document("config-version = \"2.8\"\nmotd = \"&cuntouched\"\n");
        assert!(!run(&mut doc, &directory).unwrap());
        assert_eq!(doc.get("motd").and_then(Value::as_str), Some("&cuntouched"));
    }

    #[test]
    fn motd_translation() {
        assert_eq!(
            migrate_motd("&bA cool server").as_deref(),
            Some("<aqua>A cool server")
        );
        assert_eq!(
            migrate_motd("§lBold §rplain").as_deref(),
            Some("<bold>Bold <reset>plain")
        );
        assert_eq!(
            migrate_motd(r#"{"text":"&6Json motd"}"#).as_deref(),
            Some("<gold>Json motd")
        );
        // An ampersand without a known code survives untouched.
        assert_eq!(
            migrate_motd("&bFish & chips").as_deref(),
            Some("<aqua>Fish & chips")
        );
        // Already-MiniMessage motds are left alone.
        assert_eq!(migrate_motd("<#09add3>A Passage Proxy"), None);
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("2.7"), Some((2, 7)));
        assert_eq!(parse_version("10.2"), Some((10, 2)));
        assert_eq!(parse_version("oops"), None);
        assert_eq!(document_version(&Table::new()), BASE_VERSION);
    }
}
