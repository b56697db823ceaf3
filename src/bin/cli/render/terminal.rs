use memium_lib::sync::{ApplyResult, DeckOutcome, DeckReport, PlanSummary, RunReport};
use serde_json::{json, Value};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Render a run report as one line per deck plus a summary
pub fn render_report(report: &RunReport, use_color: bool) -> String {
    let width = report.decks.iter().map(|d| d.deck.len()).max().unwrap_or(0);
    let mut lines: Vec<String> = report
        .decks
        .iter()
        .flat_map(|deck| render_deck(deck, width, use_color))
        .collect();

    if let Some(error) = &report.managed_decks_error {
        lines.push(paint(
            &format!("✗ Could not list remote decks, emptied decks were kept: {}", error),
            Color::RED,
            use_color,
        ));
    }

    let totals = report.totals();
    let summary = format!(
        "{} decks: {} added, {} updated, {} deleted, {} skipped, {} failed ({} ms)",
        report.decks.len(),
        totals.added,
        totals.updated,
        totals.deleted,
        report.skipped(),
        report.failed(),
        report.duration_ms
    );
    lines.push(paint(&summary, Color::BOLD, use_color));

    lines.join("\n")
}

fn render_deck(deck: &DeckReport, width: usize, use_color: bool) -> Vec<String> {
    let name = format!("{:<width$}", deck.deck, width = width);

    match &deck.outcome {
        DeckOutcome::Skipped => {
            vec![paint(&format!("  {}  unchanged", name), Color::DIM, use_color)]
        }
        DeckOutcome::Applied {
            planned,
            result,
            deletion_cap,
        } => {
            let mut lines = if is_dry_run(planned, result) {
                vec![paint(
                    &format!(
                        "· {}  would +{} ~{} -{}",
                        name, planned.to_add, planned.to_refresh, planned.to_delete
                    ),
                    Color::DIM,
                    use_color,
                )]
            } else {
                let marker = if result.is_partial_failure() {
                    paint("!", Color::YELLOW, use_color)
                } else {
                    paint("✓", Color::GREEN, use_color)
                };
                vec![format!(
                    "{} {}  +{} ~{} -{}",
                    marker, name, result.added, result.updated, result.deleted
                )]
            };
            if let Some(cap) = deletion_cap {
                lines.push(paint(&format!("    {}", cap), Color::YELLOW, use_color));
            }
            for error in &result.errors {
                lines.push(paint(&format!("    {}", error), Color::RED, use_color));
            }
            lines
        }
        DeckOutcome::Failed { error } => {
            vec![paint(&format!("✗ {}  {}", name, error), Color::RED, use_color)]
        }
    }
}

/// A plan with work in it whose apply did nothing: only a dry run does that
fn is_dry_run(planned: &PlanSummary, result: &ApplyResult) -> bool {
    let has_work = planned.to_add + planned.to_refresh + planned.to_delete > 0;
    has_work && result == &ApplyResult::default()
}

/// Machine-readable form of a run report
pub fn report_json(report: &RunReport) -> Value {
    let decks: Vec<Value> = report
        .decks
        .iter()
        .map(|deck| match &deck.outcome {
            DeckOutcome::Skipped => json!({ "deck": deck.deck, "status": "skipped" }),
            DeckOutcome::Applied {
                planned,
                result,
                deletion_cap,
            } => json!({
                "deck": deck.deck,
                "status": "applied",
                "planned": planned,
                "result": result,
                "deletionCapExceeded": deletion_cap.as_ref().map(|c| c.to_string()),
            }),
            DeckOutcome::Failed { error } => json!({
                "deck": deck.deck,
                "status": "failed",
                "error": error.to_string(),
            }),
        })
        .collect();

    json!({
        "decks": decks,
        "totals": report.totals(),
        "managedDecksError": report.managed_decks_error.as_ref().map(|e| e.to_string()),
        "durationMs": report.duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memium_lib::sync::{CollectionError, DeletionCapExceeded};

    fn report() -> RunReport {
        RunReport {
            decks: vec![
                DeckReport {
                    deck: "Memium".to_string(),
                    outcome: DeckOutcome::Skipped,
                },
                DeckReport {
                    deck: "Memium::Medicine".to_string(),
                    outcome: DeckOutcome::Applied {
                        planned: PlanSummary {
                            to_add: 2,
                            ..PlanSummary::default()
                        },
                        result: ApplyResult {
                            added: 2,
                            ..ApplyResult::default()
                        },
                        deletion_cap: Some(DeletionCapExceeded {
                            deck: "Memium::Medicine".to_string(),
                            candidates: 60,
                            cap: 50,
                        }),
                    },
                },
                DeckReport {
                    deck: "Memium::Offline".to_string(),
                    outcome: DeckOutcome::Failed {
                        error: CollectionError::Unavailable("connection refused".to_string()),
                    },
                },
            ],
            managed_decks_error: None,
            duration_ms: 12,
        }
    }

    fn applied(planned: PlanSummary, result: ApplyResult) -> RunReport {
        RunReport {
            decks: vec![DeckReport {
                deck: "Memium".to_string(),
                outcome: DeckOutcome::Applied {
                    planned,
                    result,
                    deletion_cap: None,
                },
            }],
            ..RunReport::default()
        }
    }

    #[test]
    fn test_plain_report() {
        let text = render_report(&report(), false);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("unchanged"));
        assert!(lines[1].starts_with("✓ Memium::Medicine"));
        assert!(lines[1].ends_with("+2 ~0 -0"));
        assert!(lines[2].contains("Refusing to delete 60 notes"));
        assert!(lines[3].starts_with("✗ Memium::Offline"));
        assert_eq!(lines[4], "3 decks: 2 added, 0 updated, 0 deleted, 1 skipped, 1 failed (12 ms)");
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_colored_report() {
        let text = render_report(&report(), true);
        assert!(text.contains(Color::RED));
        assert!(text.contains(Color::RESET));
    }

    #[test]
    fn test_json_report() {
        let value = report_json(&report());

        assert_eq!(value["decks"][0]["status"], "skipped");
        assert_eq!(value["decks"][1]["planned"]["toAdd"], 2);
        assert_eq!(value["decks"][2]["status"], "failed");
        assert_eq!(value["totals"]["added"], 2);
        assert!(value["managedDecksError"].is_null());
    }

    #[test]
    fn test_dry_run_shows_planned_counts() {
        let planned = PlanSummary {
            to_add: 3,
            to_refresh: 1,
            to_delete: 2,
            ..PlanSummary::default()
        };
        let text = render_report(&applied(planned, ApplyResult::default()), false);

        assert_eq!(text.lines().next().unwrap(), "· Memium  would +3 ~1 -2");
    }

    #[test]
    fn test_partial_failure_is_marked() {
        let planned = PlanSummary {
            to_add: 2,
            ..PlanSummary::default()
        };
        let result = ApplyResult {
            added: 1,
            errors: vec!["Memium QA 12: deck was not found".to_string()],
            ..ApplyResult::default()
        };
        let text = render_report(&applied(planned, result), false);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "! Memium  +1 ~0 -0");
        assert_eq!(lines[1], "    Memium QA 12: deck was not found");
    }

    #[test]
    fn test_unlisted_remote_decks_are_shown() {
        let mut unlisted = report();
        unlisted.managed_decks_error = Some(CollectionError::Remote("deckNames failed".to_string()));

        let text = render_report(&unlisted, false);
        assert!(text.contains("Could not list remote decks"));
        assert_eq!(report_json(&unlisted)["managedDecksError"], "Remote collection error: deckNames failed");
    }
}
