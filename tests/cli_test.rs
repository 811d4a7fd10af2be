use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use uuid::Uuid;

fn transaction_json(amount: &str, created_at: &str) -> serde_json::Value {
    serde_json::json!({
        "id": Uuid::new_v4(),
        "participant_id": Uuid::new_v4(),
        "provider_id": Uuid::new_v4(),
        "plan_id": Uuid::new_v4(),
        "category_id": Uuid::new_v4(),
        "voucher_id": null,
        "amount": amount,
        "method": "stripe",
        "external_ref": format!("cs_{}", Uuid::new_v4().simple()),
        "status": "COMPLETED",
        "metadata": {},
        "created_at": created_at,
        "completed_at": created_at,
    })
}

#[test]
fn test_scan_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = tempfile::NamedTempFile::new()?;
    let transactions = serde_json::json!([
        transaction_json("15000.00", "2025-06-02T11:00:00Z"),
        transaction_json("40.00", "2025-06-02T23:30:00Z"),
    ]);
    input.write_all(transactions.to_string().as_bytes())?;

    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("scan").arg(input.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("UNUSUALLY_LARGE_TRANSACTION"))
        .stdout(predicate::str::contains("OFF_HOURS_ACTIVITY"));

    Ok(())
}

#[test]
fn test_scan_clean_log_prints_empty_list() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = tempfile::NamedTempFile::new()?;
    let transactions =
        serde_json::json!([transaction_json("40.00", "2025-06-02T11:00:00Z")]);
    input.write_all(transactions.to_string().as_bytes())?;

    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("scan").arg(input.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[]"));

    Ok(())
}

#[test]
fn test_scan_missing_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("scan").arg("/nonexistent/transactions.json");

    cmd.assert().failure();

    Ok(())
}
