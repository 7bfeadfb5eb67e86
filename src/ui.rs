//! Interface de terminal do tailpool — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`BatchProgress`] acompanha visualmente
//! a execução de um lote no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::modes::SessionReport;
use crate::stats::StatsSnapshot;

/// Indicador visual de progresso para a execução de um lote no terminal.
pub struct BatchProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
}

impl BatchProgress {
    /// Inicia o spinner com a descrição do lote.
    pub fn start(label: &str, jobs: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{label}: {jobs} job(s)"));
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// Finaliza o spinner sem deixar rastro no terminal.
    pub fn finish(self) {
        self.pb.finish_and_clear();
    }
}

/// Imprime um snapshot das estatísticas com cores.
pub fn print_stats(snapshot: &StatsSnapshot) {
    let cyan = Style::new().cyan();
    let bold = Style::new().bold();
    let green = Style::new().green();
    let red = Style::new().red();

    println!();
    println!("{}", cyan.apply_to("─── Statistics ───"));
    println!("  {} {}", green.apply_to("✓ succeeded:"), snapshot.success_count);
    println!("  {} {}", red.apply_to("✗ failed:   "), snapshot.fail_count);
    println!("  {} {}", bold.apply_to("  total:    "), snapshot.total_processed);
    println!("    success rate: {:.2}%", snapshot.success_rate);
    println!("    elapsed:      {:.2}s", snapshot.elapsed_secs);
    println!("    throughput:   {:.2} jobs/min", snapshot.throughput);
}

/// Imprime o relatório final da sessão, em texto colorido ou JSON.
pub fn print_report(report: &SessionReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
        return;
    }

    let style = if report.stats.fail_count == 0 {
        Style::new().green().bold()
    } else {
        Style::new().yellow().bold()
    };
    println!();
    println!(
        "{}",
        style.apply_to(format!("─── Session {} finished ({}) ───", report.session_id, report.mode))
    );
    print_stats(&report.stats);
    println!("    batches:      {}", report.batches);
    if report.result.abandoned > 0 {
        println!(
            "    {}",
            Style::new()
                .yellow()
                .apply_to(format!("abandoned:    {}", report.result.abandoned))
        );
    }
}
