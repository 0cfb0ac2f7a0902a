//! The `accqst init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("accqst.toml").exists() {
        println!("accqst.toml already exists, skipping.");
    } else {
        std::fs::write("accqst.toml", SAMPLE_CONFIG)?;
        println!("Created accqst.toml");
    }

    std::fs::create_dir_all("questions")?;
    let example_path = std::path::Path::new("questions/example.toml");
    if example_path.exists() {
        println!("questions/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUESTION)?;
        println!("Created questions/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: accqst validate --question questions/example.toml");
    println!("  2. Write submitted rows to rows.json, e.g.");
    println!(r#"     {{"1": [{{"left_account": "1200", "left_amount": "500,00", "right_account": "4000", "right_amount": "500,00"}}]}}"#);
    println!("  3. Run: accqst encode --question questions/example.toml --rows rows.json > solution.json");
    println!("  4. Run: accqst grade --question questions/example.toml --solution solution.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# accqst configuration

thousands_delim = "none"
thousands_delim_per_question = false
default_precision = 2
decimal_separator = ","

[labels]
point = "point"
points = "points"
"#;

const EXAMPLE_QUESTION: &str = r#"[question]
title = "Cash sale"
author = "accqst"
text = "A customer pays {x} in cash for goods. Book the sale."
accounts = """
<konten>
  <konto nummer="1000" titel="Cash"/>
  <konto nummer="1200" titel="Bank"/>
  <konto nummer="4000" titel="Sales"/>
</konten>
"""
variables = """
<variables>
  <var name="x" value="500"/>
</variables>
"""

[[parts]]
text = "Book the receipt of {x}."
max_lines = 2
booking = """
<input>
  <row leftAccountNum="1000" leftValueMoney="{x}" rightAccountNum="4000" rightValueMoney="{x}"/>
</input>
"""
"#;
