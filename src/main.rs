use scratch_editor::EditorConfig;

fn main() -> anyhow::Result<()> {
    let config = EditorConfig::from_env()?;
    scratch_editor::run(config)
}
