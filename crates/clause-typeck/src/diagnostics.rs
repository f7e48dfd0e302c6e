//! Ariadne-based diagnostic rendering for type errors.
//!
//! Renders `TypeError` variants into labeled error reports against the raw
//! text of the contract expression they came from. Output is terse with
//! dual-span labels where the constraint has two sides and a help line when
//! a plausible fix exists.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::error::{ConstraintOrigin, TypeError};
use crate::ty::Ty;

// ── Error Codes ────────────────────────────────────────────────────────

/// Assign a unique error code to each TypeError variant.
pub fn error_code(err: &TypeError) -> &'static str {
    match err {
        TypeError::Mismatch { .. } => "E0001",
        TypeError::InfiniteType { .. } => "E0002",
        TypeError::ArityMismatch { .. } => "E0003",
        TypeError::UnboundVariable { .. } => "E0004",
        TypeError::RecordFieldMismatch { .. } => "E0005",
        TypeError::NoSuchField { .. } => "E0006",
        TypeError::UnknownBuiltin { .. } => "E0007",
        TypeError::Resolution { .. } => "E0008",
        TypeError::UncheckedCallee { .. } => "E0009",
    }
}

// ── Fix Suggestions ────────────────────────────────────────────────────

fn fix_suggestion(expected: &Ty, found: &Ty) -> Option<String> {
    match (expected, found) {
        (Ty::Boolean, Ty::Number) | (Ty::Boolean, Ty::String) => {
            Some("expected a boolean expression; compare the value with `=` or `>`".to_string())
        }
        (Ty::Set(_), Ty::Tuple(_)) => {
            Some("sequences are written `<<...>>`, sets `{...}`".to_string())
        }
        (Ty::Tuple(_), Ty::Set(_)) => {
            Some("sets are written `{...}`, sequences `<<...>>`".to_string())
        }
        (Ty::Set(inner), other) if inner.as_ref() == other => {
            Some("wrap the value in a set literal `{...}`".to_string())
        }
        _ => None,
    }
}

// ── Main Rendering Function ────────────────────────────────────────────

/// Render a type error into a formatted diagnostic string using ariadne.
///
/// `color` should be false wherever the output is compared or stored.
pub fn render_diagnostic(error: &TypeError, source: &str, name: &str, color: bool) -> String {
    let config = Config::default().with_color(color);
    let source_len = source.len();

    // Clamp a range to be valid within source bounds.
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };
    let whole = 0..source_len;
    let primary = clamp(error.span().map(|s| s.range()).unwrap_or(whole));

    let code = error_code(error);
    let msg = error.to_string();
    let builder = Report::build(ReportKind::Error, primary.clone())
        .with_code(code)
        .with_message(&msg)
        .with_config(config);

    let report = match error {
        TypeError::Mismatch {
            expected,
            found,
            origin,
        } => {
            let mut builder = builder;
            match origin {
                ConstraintOrigin::IfBranches {
                    then_span,
                    else_span,
                    ..
                } => {
                    builder.add_label(
                        Label::new(clamp(then_span.range()))
                            .with_message(format!("this branch is {}", expected))
                            .with_color(Color::Red),
                    );
                    builder.add_label(
                        Label::new(clamp(else_span.range()))
                            .with_message(format!("this branch is {}", found))
                            .with_color(Color::Blue),
                    );
                }
                ConstraintOrigin::Element {
                    literal_span,
                    elem_span,
                } => {
                    builder.add_label(
                        Label::new(clamp(elem_span.range()))
                            .with_message(format!("found {}", found))
                            .with_color(Color::Red),
                    );
                    builder.add_label(
                        Label::new(clamp(literal_span.range()))
                            .with_message(format!("elements of this literal are {}", expected))
                            .with_color(Color::Blue),
                    );
                }
                _ => {
                    builder.add_label(
                        Label::new(primary)
                            .with_message(format!("expected {}, found {}", expected, found))
                            .with_color(Color::Red),
                    );
                }
            }
            if let Some(fix) = fix_suggestion(expected, found) {
                builder.set_help(fix);
            }
            builder.finish()
        }

        TypeError::InfiniteType { .. } => builder
            .with_label(
                Label::new(primary)
                    .with_message("recursive type here")
                    .with_color(Color::Red),
            )
            .with_help("a value cannot have a type that contains itself")
            .finish(),

        TypeError::ArityMismatch {
            expected, found, ..
        } => {
            let help = if expected > found {
                format!("missing {} argument(s)", expected - found)
            } else {
                format!("{} extra argument(s)", found - expected)
            };
            builder
                .with_label(
                    Label::new(primary)
                        .with_message(format!("expected {} argument(s)", expected))
                        .with_color(Color::Red),
                )
                .with_help(help)
                .finish()
        }

        TypeError::RecordFieldMismatch {
            expected, found, ..
        } => {
            let missing: Vec<&str> = expected
                .iter()
                .filter(|f| !found.contains(*f))
                .map(String::as_str)
                .collect();
            let extra: Vec<&str> = found
                .iter()
                .filter(|f| !expected.contains(*f))
                .map(String::as_str)
                .collect();
            let mut builder = builder.with_label(
                Label::new(primary)
                    .with_message("records with different fields")
                    .with_color(Color::Red),
            );
            if !missing.is_empty() {
                builder.set_help(format!("missing field(s): {}", missing.join(", ")));
            } else if !extra.is_empty() {
                builder.set_help(format!("unexpected field(s): {}", extra.join(", ")));
            }
            builder.finish()
        }

        TypeError::UnboundVariable { name, .. } => builder
            .with_label(
                Label::new(primary)
                    .with_message(format!("`{}` is not a parameter or bound variable", name))
                    .with_color(Color::Red),
            )
            .finish(),

        TypeError::NoSuchField { ty, field, .. } => builder
            .with_label(
                Label::new(primary)
                    .with_message(format!("`{}` is not a field of {}", field, ty))
                    .with_color(Color::Red),
            )
            .finish(),

        TypeError::UnknownBuiltin { .. } => builder
            .with_label(
                Label::new(primary)
                    .with_message("no such builtin")
                    .with_color(Color::Red),
            )
            .with_help("builtins are called as `_Module!Name(...)`")
            .finish(),

        TypeError::Resolution { error, .. } => builder
            .with_label(
                Label::new(primary)
                    .with_message(error.to_string())
                    .with_color(Color::Red),
            )
            .finish(),

        TypeError::UncheckedCallee { key, .. } => builder
            .with_label(
                Label::new(primary)
                    .with_message(format!("`{}` has no checked signature", key))
                    .with_color(Color::Red),
            )
            .with_help("the callee failed to type-check or calls this definition back")
            .finish(),
    };

    let mut buf = Vec::new();
    if report.write(Source::from(source), &mut buf).is_err() {
        return format!("[{}] {}: {}", code, name, msg);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
