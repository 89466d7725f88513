//! Alert message templates for the notification sink.
//!
//! Messages are HTML-formatted for Telegram delivery; the sink sends
//! them verbatim.

use super::orchestrator::SweepSummary;

/// Alert for a strategy clearing the sharpe threshold on any instrument.
pub fn high_sharpe(item_id: &str, sharpe: f64, symbol: &str) -> String {
    format!(
        "<b>High Sharpe Discovery</b>\n\
         \n\
         Script: <code>{item_id}</code>\n\
         Instrument: <b>{symbol}</b>\n\
         Sharpe Ratio: <b>{sharpe:.2}</b>\n\
         \n\
         This strategy may be worth investigating for live signals."
    )
}

/// End-of-sweep summary.
pub fn sweep_summary(summary: &SweepSummary, elapsed_secs: f64) -> String {
    let attempted = summary.processed + summary.failed + summary.skipped;
    let success_rate = if attempted > 0 {
        summary.processed as f64 / attempted as f64 * 100.0
    } else {
        0.0
    };
    format!(
        "<b>pinerank</b> -- Sweep Summary\n\
         \n\
         Evaluated: <b>{}</b>\n\
         Failed: <b>{}</b>\n\
         Duplicates skipped: <b>{}</b>\n\
         Already done: <b>{}</b>\n\
         Runtime: {:.0}s\n\
         Success rate: {:.0}%",
        summary.processed, summary.failed, summary.skipped, summary.already_done, elapsed_secs, success_rate,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_sharpe_mentions_script_and_instrument() {
        let message = high_sharpe("twin-range-filter", 2.41, "BTC-USD");
        assert!(message.contains("<code>twin-range-filter</code>"));
        assert!(message.contains("BTC-USD"));
        assert!(message.contains("2.41"));
    }

    #[test]
    fn sweep_summary_reports_counts_and_rate() {
        let summary = SweepSummary {
            processed: 3,
            failed: 1,
            skipped: 0,
            already_done: 2,
        };
        let message = sweep_summary(&summary, 125.4);
        assert!(message.contains("Evaluated: <b>3</b>"));
        assert!(message.contains("Failed: <b>1</b>"));
        assert!(message.contains("125s"));
        assert!(message.contains("75%"));
    }

    #[test]
    fn sweep_summary_handles_empty_run() {
        let message = sweep_summary(&SweepSummary::default(), 0.0);
        assert!(message.contains("Success rate: 0%"));
    }
}
