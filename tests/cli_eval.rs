use assert_cmd::Command;
use tempfile::TempDir;

fn make_layout(dir: &TempDir, name: &str, seed: u64) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.path().join(name);
    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("make")
        .arg("--rows")
        .arg("8")
        .arg("--cols")
        .arg("8")
        .arg("--probe-len")
        .arg("12")
        .arg("--seed")
        .arg(seed.to_string())
        .arg("-o")
        .arg(&path)
        .assert()
        .success();
    Ok(path)
}

fn parse_field(stdout: &str, key: &str) -> Option<String> {
    stdout
        .lines()
        .find(|l| l.starts_with(key))
        .and_then(|l| l.split('\t').nth(1).map(|s| s.to_string()))
}

#[test]
fn command_eval_border() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let layout = make_layout(&temp, "chip.tsv", 5)?;

    let mut cmd = Command::cargo_bin("marl")?;
    let output = cmd.arg("eval").arg(&layout).output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let bl: u64 = parse_field(&stdout, "border_length").unwrap().parse()?;
    assert!(bl > 0);
    assert!(stdout.contains("normalized\t"));

    Ok(())
}

#[test]
fn command_eval_per_step_sums_to_total() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let layout = make_layout(&temp, "chip.tsv", 9)?;

    let mut cmd = Command::cargo_bin("marl")?;
    let output = cmd.arg("eval").arg(&layout).arg("--per-step").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let bl: u64 = parse_field(&stdout, "border_length").unwrap().parse()?;
    let per_step = parse_field(&stdout, "per_step").unwrap();
    let sum: u64 = per_step.split(',').map(|v| v.parse::<u64>().unwrap()).sum();
    assert_eq!(sum, bl);

    Ok(())
}

#[test]
fn command_eval_conflict_index() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let layout = make_layout(&temp, "chip.tsv", 3)?;

    let mut cmd = Command::cargo_bin("marl")?;
    let output = cmd
        .arg("eval")
        .arg(&layout)
        .arg("--model")
        .arg("default")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let ci: f64 = parse_field(&stdout, "avg_conflict_index").unwrap().parse()?;
    assert!(ci > 0.0);

    Ok(())
}
