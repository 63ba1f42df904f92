use ratatui::{
    prelude::*,
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, Wrap},
};
use yieldcast_core::{model::MONTH_CODES, service::Estimate};

use crate::app::{App, Field, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new("yieldcast – residential solar yield for UK postcodes")
        .block(Block::default().borders(Borders::ALL).title("Yieldcast"));
    frame.render_widget(header, *header_area);

    match (app.screen, &app.estimate) {
        (Screen::Results, Some(estimate)) => draw_results(frame, estimate, *content_area),
        _ => draw_form(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::Form => {
            "Type to edit · ↑/↓/Tab move · ←/→ orientation · Enter estimate · Esc/Ctrl-C quit"
        }
        Screen::Results => "Esc/←/b back to form · q/Ctrl-C quit",
    };

    let status_text = if app.is_loading {
        format!("Estimating… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_form(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let lines = Field::ALL
        .into_iter()
        .map(|field| {
            let focused = field == app.form.focus;
            let prefix = if focused { "> " } else { "  " };
            let value = if field == Field::Orientation {
                format!(
                    "◀ {} ▶ (×{:.2})",
                    app.form.orientation.label(),
                    app.form.orientation.factor()
                )
            } else {
                app.form.value(field).to_owned()
            };
            let style = if focused {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{prefix}{:<28}", field.label()), style),
                Span::styled(value, style),
            ])
        })
        .collect::<Vec<Line<'_>>>();

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Solar array (Enter to estimate)"),
    );
    frame.render_widget(form, area);
}

fn draw_results(frame: &mut Frame<'_>, estimate: &Estimate, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);
    let [left_area, right_area] = columns.as_ref() else {
        return;
    };

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(10), Constraint::Min(0)])
        .split(*left_area);
    let [summary_area, assumptions_area] = left.as_ref() else {
        return;
    };

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Min(0)])
        .split(*right_area);
    let [chart_area, months_area] = right.as_ref() else {
        return;
    };

    draw_summary(frame, estimate, *summary_area);
    draw_assumptions(frame, estimate, *assumptions_area);
    draw_monthly_chart(frame, estimate, *chart_area);
    draw_monthly_table(frame, estimate, *months_area);
}

fn draw_summary(frame: &mut Frame<'_>, estimate: &Estimate, area: Rect) {
    let location = &estimate.location;
    let result = &estimate.result;
    let (low, high) = estimate.annual_range_kwh();

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(format!("{} · {}", location.postcode, location.region)),
        Line::from(format!(
            "{:.4}, {:.4}",
            location.latitude, location.longitude
        )),
        Line::from(Span::styled(
            format!("Annual yield: {:.0} kWh", result.annual_kwh),
            bold.fg(Color::Green),
        )),
        Line::from(format!(
            "Likely range: {low:.0}–{high:.0} kWh (±{:.0}%)",
            estimate.confidence_band_percent
        )),
        Line::from(format!(
            "Capacity factor: {:.1}%",
            result.capacity_factor * 100.0
        )),
        Line::from(format!("Specific yield: {:.1} kWh/kWp", result.kwh_per_kwp)),
        Line::from(format!(
            "Irradiance: {:.0} kWh/m²/yr ({})",
            estimate.climate.annual_ghi, estimate.climate.source
        )),
        Line::from(format!("Model {}", estimate.calculation_version)),
    ];

    let summary = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Estimate"))
        .wrap(Wrap { trim: true });
    frame.render_widget(summary, area);
}

fn draw_assumptions(frame: &mut Frame<'_>, estimate: &Estimate, area: Rect) {
    let rows = estimate
        .result
        .assumptions
        .iter()
        .map(|(name, value)| Row::new(vec![Cell::from(name.clone()), Cell::from(value.to_string())]));

    let table = Table::new(rows, [Constraint::Length(26), Constraint::Min(10)])
        .header(
            Row::new(vec!["Assumption", "Value"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title("Assumptions"))
        .column_spacing(1);
    frame.render_widget(table, area);
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "monthly energy is a small non-negative kWh figure"
)]
fn draw_monthly_chart(frame: &mut Frame<'_>, estimate: &Estimate, area: Rect) {
    let bars = MONTH_CODES
        .into_iter()
        .zip(estimate.result.monthly_kwh)
        .map(|(code, kwh)| (code, kwh.max(0.0).round() as u64))
        .collect::<Vec<(&str, u64)>>();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Monthly yield (kWh)"))
        .data(bars.as_slice())
        .bar_width(4)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Yellow))
        .value_style(Style::default().fg(Color::Black).bg(Color::Yellow));
    frame.render_widget(chart, area);
}

fn draw_monthly_table(frame: &mut Frame<'_>, estimate: &Estimate, area: Rect) {
    let rows = MONTH_CODES
        .into_iter()
        .zip(estimate.result.monthly_kwh)
        .zip(estimate.climate.monthly_ghi)
        .map(|((code, kwh), ghi)| {
            Row::new(vec![
                Cell::from(code),
                Cell::from(format!("{ghi:.2}")),
                Cell::from(format!("{kwh:.2}")),
            ])
        });

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(14),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["Month", "GHI kWh/m²/d", "Energy kWh"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("By month"))
    .column_spacing(1);
    frame.render_widget(table, area);
}
