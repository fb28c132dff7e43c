use assert_cmd::Command;
use tempfile::TempDir;

#[test]
fn command_count() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let layout = temp.path().join("chip.tsv");

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("make")
        .arg("--rows")
        .arg("4")
        .arg("--cols")
        .arg("4")
        .arg("--probe-len")
        .arg("10")
        .arg("--seed")
        .arg("8")
        .arg("-o")
        .arg(&layout)
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("marl")?;
    let output = cmd.arg("count").arg(&layout).output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 16);
    for line in stdout.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 2);
        // every stored embedding is one of the counted ones
        assert!(fields[1].parse::<u64>()? >= 1);
    }

    Ok(())
}

#[test]
fn command_count_pivots() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let layout = temp.path().join("chip.tsv");

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("make")
        .arg("--rows")
        .arg("6")
        .arg("--cols")
        .arg("6")
        .arg("--probe-len")
        .arg("12")
        .arg("--seed")
        .arg("5")
        .arg("-o")
        .arg(&layout)
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("marl")?;
    let output = cmd.arg("count").arg(&layout).arg("--pivots").arg("3").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let counts: Vec<u64> = stdout
        .lines()
        .map(|l| l.split('\t').nth(1).unwrap().parse().unwrap())
        .collect();
    assert_eq!(counts.len(), 3);
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));

    Ok(())
}
