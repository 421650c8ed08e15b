//! The `adaptest init` command.

use std::path::Path;

use anyhow::Result;

use adaptest_sim::{generate_bank, BankSpec};
use adaptest_store::ItemBankFile;

const CONFIG_FILE: &str = "adaptest.toml";
const BANK_FILE: &str = "item-bank.toml";

pub fn execute() -> Result<()> {
    if Path::new(CONFIG_FILE).exists() {
        println!("{CONFIG_FILE} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_FILE, SAMPLE_CONFIG)?;
        println!("Created {CONFIG_FILE}");
    }

    if Path::new(BANK_FILE).exists() {
        println!("{BANK_FILE} already exists, skipping.");
    } else {
        let bank = ItemBankFile {
            id: "synthetic".into(),
            name: "Synthetic ENAMED bank".into(),
            items: generate_bank(&BankSpec::default())?,
        };
        bank.write(Path::new(BANK_FILE))?;
        println!("Created {BANK_FILE} ({} items)", bank.items.len());
    }

    println!("\nNext steps:");
    println!("  1. Replace {BANK_FILE} with a calibrated bank");
    println!("  2. Run: adaptest validate --bank {BANK_FILE}");
    println!("  3. Run: adaptest start --areas clinica_medica,pediatria");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

bank = "item-bank.toml"
store_dir = "adaptest-sessions"
default_areas = [
    "clinica_medica",
    "cirurgia",
    "ginecologia_obstetricia",
    "pediatria",
    "saude_coletiva",
]

[engine]
min_items = 30
max_items = 80
target_se = 0.30
quadrature_points = 81
theta_min = -4.0
theta_max = 4.0
# max_exposure_rate = 0.25

# [engine.area_minimums]
# saude_coletiva = 10
"#;
