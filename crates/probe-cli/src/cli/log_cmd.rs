use super::*;
use probe_core::model::STATUS_OK;

pub(super) fn handle_last_trial(args: LogArgs, config: &ProbeConfig) -> anyhow::Result<()> {
    let log = CsvTrialLog::new(log_path(&args, config));
    let last = log.last_sequence()?;
    println!("{last}");
    Ok(())
}

pub(super) fn handle_summary(args: LogArgs, config: &ProbeConfig) -> anyhow::Result<()> {
    let log = CsvTrialLog::new(log_path(&args, config));
    let counts = log.status_counts()?;
    for line in summary_lines(&counts) {
        println!("{line}");
    }
    Ok(())
}

fn log_path(args: &LogArgs, config: &ProbeConfig) -> PathBuf {
    args.log.clone().unwrap_or_else(|| config.log_path.clone())
}

pub(super) fn summary_lines(counts: &std::collections::BTreeMap<u16, u64>) -> Vec<String> {
    let total: u64 = counts.values().sum();
    if total == 0 {
        return vec!["no trials logged".to_string()];
    }
    let mut lines: Vec<String> = counts
        .iter()
        .map(|(status, count)| format!("status {status}: {count}"))
        .collect();
    let ok = counts.get(&STATUS_OK).copied().unwrap_or(0);
    lines.push(format!(
        "total: {total}, success rate: {:.1}%",
        ok as f64 * 100.0 / total as f64
    ));
    lines
}
