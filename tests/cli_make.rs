use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn command_make_to_stdout() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("marl")?;
    let output = cmd
        .arg("make")
        .arg("--rows")
        .arg("6")
        .arg("--cols")
        .arg("6")
        .arg("--probe-len")
        .arg("10")
        .arg("--seed")
        .arg("42")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(stdout.contains("# marl layout"));
    assert!(stdout.contains("rows=6 cols=6 probes=36 probe_len=10 pairs=0"));
    assert!(stdout.contains("dep_seq=TGCA"));
    // 3 header lines + one line per spot
    assert_eq!(stdout.lines().count(), 3 + 36);

    Ok(())
}

#[test]
fn command_make_rejects_bad_dep_seq() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("make")
        .arg("--rows")
        .arg("2")
        .arg("--cols")
        .arg("2")
        .arg("--probe-len")
        .arg("4")
        .arg("--dep-seq")
        .arg("TGCAXTGCA")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid base"));

    Ok(())
}

#[test]
fn command_make_is_reproducible() -> anyhow::Result<()> {
    let run = || -> anyhow::Result<String> {
        let mut cmd = Command::cargo_bin("marl")?;
        let output = cmd
            .arg("make")
            .arg("--rows")
            .arg("4")
            .arg("--cols")
            .arg("4")
            .arg("--probe-len")
            .arg("8")
            .arg("--seed")
            .arg("7")
            .output()?;
        Ok(String::from_utf8(output.stdout)?)
    };

    assert_eq!(run()?, run()?);

    Ok(())
}

#[test]
fn command_make_pairs() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let layout = temp.path().join("chip.tsv");

    let mut cmd = Command::cargo_bin("marl")?;
    cmd.arg("make")
        .arg("--rows")
        .arg("6")
        .arg("--cols")
        .arg("4")
        .arg("--probe-len")
        .arg("9")
        .arg("--pairs")
        .arg("--seed")
        .arg("1")
        .arg("-o")
        .arg(&layout)
        .assert()
        .success();

    let content = fs::read_to_string(&layout)?;
    assert!(content.contains("pairs=1"));
    // every pair contributes a P line and an M line
    let pm = content.lines().filter(|l| l.contains("\tP\t")).count();
    let mm = content.lines().filter(|l| l.contains("\tM\t")).count();
    assert_eq!(pm, mm);
    assert_eq!(pm, 12);

    Ok(())
}
