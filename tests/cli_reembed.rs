use assert_cmd::Command;
use tempfile::TempDir;

fn border_length(layout: &std::path::Path) -> anyhow::Result<u64> {
    let mut cmd = Command::cargo_bin("marl")?;
    let output = cmd.arg("eval").arg(layout).output()?;
    let stdout = String::from_utf8(output.stdout)?;
    let bl = stdout
        .lines()
        .find(|l| l.starts_with("border_length"))
        .unwrap()
        .split('\t')
        .nth(1)
        .unwrap()
        .parse()?;
    Ok(bl)
}

#[test]
fn command_reembed_reduces_border_length() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let before = temp.path().join("before.tsv");
    let after = temp.path().join("after.tsv");

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("make")
        .arg("--rows")
        .arg("10")
        .arg("--cols")
        .arg("10")
        .arg("--probe-len")
        .arg("12")
        .arg("--seed")
        .arg("17")
        .arg("-o")
        .arg(&before)
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("reembed")
        .arg(&before)
        .arg("-o")
        .arg(&after)
        .assert()
        .success();

    let bl_before = border_length(&before)?;
    let bl_after = border_length(&after)?;
    assert!(
        bl_after < bl_before,
        "re-embedding did not improve: {} -> {}",
        bl_before,
        bl_after
    );

    Ok(())
}

#[test]
fn command_reembed_pairs() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let before = temp.path().join("before.tsv");
    let after = temp.path().join("after.tsv");

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("make")
        .arg("--rows")
        .arg("8")
        .arg("--cols")
        .arg("4")
        .arg("--probe-len")
        .arg("15")
        .arg("--pairs")
        .arg("--seed")
        .arg("23")
        .arg("-o")
        .arg(&before)
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("reembed")
        .arg(&before)
        .arg("--model")
        .arg("default")
        .arg("--max-passes")
        .arg("2")
        .arg("-o")
        .arg(&after)
        .assert()
        .success();

    // the re-embedded layout must still parse as a valid paired chip
    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("eval").arg(&after).assert().success();

    Ok(())
}

#[test]
fn command_reembed_idempotent_at_convergence() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let first = temp.path().join("first.tsv");
    let second = temp.path().join("second.tsv");

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("make")
        .arg("--rows")
        .arg("6")
        .arg("--cols")
        .arg("6")
        .arg("--probe-len")
        .arg("8")
        .arg("--seed")
        .arg("2")
        .arg("-o")
        .arg(temp.path().join("raw.tsv"))
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("reembed")
        .arg(temp.path().join("raw.tsv"))
        .arg("--threshold")
        .arg("0")
        .arg("-o")
        .arg(&first)
        .assert()
        .success();

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("reembed")
        .arg(&first)
        .arg("--threshold")
        .arg("0")
        .arg("-o")
        .arg(&second)
        .assert()
        .success();

    assert!(border_length(&second)? <= border_length(&first)?);

    Ok(())
}
