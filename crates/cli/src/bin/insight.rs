use anyhow::Result;

fn main() -> Result<()> {
    insight_cli::main_entry()
}
