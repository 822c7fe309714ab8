//! Proposal builder: normalizes the proposal record and renders the HTML
//! artifact the PDF export consumes.

use async_trait::async_trait;
use openmud_core::error::ToolError;
use openmud_core::tool::ToolHandler;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::html::escape;
use crate::names::RENDER_PROPOSAL;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidItem {
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub client: String,
    pub scope: String,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bid_items: Vec<BidItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assumptions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusions: Option<String>,
    pub html: String,
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
}

fn text(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_items(value: Option<&Value>) -> Result<Vec<BidItem>, ToolError> {
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let description = item
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let quantity = number(item.get("quantity")).unwrap_or(1.0);
            let unit_price = number(item.get("unit_price")).unwrap_or(0.0);
            let amount = number(item.get("amount")).unwrap_or(quantity * unit_price);
            if description.is_empty() {
                return Err(ToolError::InvalidArguments(format!("bid_items[{i}] needs a description")));
            }
            Ok(BidItem {
                description,
                quantity,
                unit: item.get("unit").and_then(Value::as_str).unwrap_or("LS").to_string(),
                unit_price,
                amount: round_cents(amount),
            })
        })
        .collect()
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Format a dollar amount with thousands separators: `1234.5` → `$1,234.50`.
pub fn format_money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// Build a proposal from tool arguments.
pub fn build_proposal(args: &Map<String, Value>) -> Result<Proposal, ToolError> {
    let client = text(args, "client").unwrap_or_else(|| "Client".to_string());
    let scope = text(args, "scope")
        .ok_or_else(|| ToolError::InvalidArguments("scope is required".into()))?;
    let bid_items = parse_items(args.get("bid_items"))?;

    let total = match number(args.get("total")) {
        Some(t) => round_cents(t),
        None if !bid_items.is_empty() => round_cents(bid_items.iter().map(|b| b.amount).sum()),
        None => return Err(ToolError::InvalidArguments("total or bid_items is required".into())),
    };

    let mut proposal = Proposal {
        client,
        scope,
        total,
        duration: number(args.get("duration")).map(|d| d.round() as i64),
        bid_items,
        assumptions: text(args, "assumptions"),
        exclusions: text(args, "exclusions"),
        html: String::new(),
    };
    proposal.html = render_html(&proposal);
    Ok(proposal)
}

fn render_html(p: &Proposal) -> String {
    let mut html = String::from(r#"<div class="proposal" style="font-family:sans-serif;max-width:800px;">"#);
    html.push_str("<h1>Proposal</h1>");
    html.push_str(&format!("<p><strong>Prepared for:</strong> {}</p>", escape(&p.client)));
    html.push_str(&format!("<h2>Scope of Work</h2><p>{}</p>", escape(&p.scope)));

    if !p.bid_items.is_empty() {
        html.push_str(r#"<table style="width:100%;border-collapse:collapse;"><tr style="background:#f0f0f0;"><th style="text-align:left;padding:8px;">Item</th><th>Qty</th><th>Unit</th><th>Unit Price</th><th>Amount</th></tr>"#);
        for item in &p.bid_items {
            html.push_str(&format!(
                r#"<tr><td style="padding:8px;">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                escape(&item.description),
                item.quantity,
                escape(&item.unit),
                format_money(item.unit_price),
                format_money(item.amount)
            ));
        }
        html.push_str("</table>");
    }

    html.push_str(&format!("<p><strong>Total:</strong> {}</p>", format_money(p.total)));
    if let Some(days) = p.duration {
        html.push_str(&format!("<p><strong>Duration:</strong> {days} working days</p>"));
    }
    if let Some(a) = &p.assumptions {
        html.push_str(&format!("<h3>Assumptions</h3><p>{}</p>", escape(a)));
    }
    if let Some(e) = &p.exclusions {
        html.push_str(&format!("<h3>Exclusions</h3><p>{}</p>", escape(e)));
    }
    html.push_str("</div>");
    html
}

/// The `render_proposal_html` tool.
pub struct ProposalTool;

#[async_trait]
impl ToolHandler for ProposalTool {
    fn name(&self) -> &str {
        RENDER_PROPOSAL
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let proposal = build_proposal(args)?;
        serde_json::to_value(proposal).map_err(|e| ToolError::ExecutionFailed {
            tool_name: RENDER_PROPOSAL.into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(1234.5), "$1,234.50");
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_money(-12.5), "-$12.50");
    }

    #[test]
    fn explicit_total_wins() {
        let p = build_proposal(&args(json!({
            "client": "City of Ogden",
            "scope": "500 LF of 8\" PVC sewer",
            "total": "$48,250",
            "duration": 14
        })))
        .unwrap();
        assert_eq!(p.total, 48250.0);
        assert_eq!(p.duration, Some(14));
        assert!(p.html.contains("$48,250.00"));
        assert!(p.html.contains("8&quot; PVC"));
    }

    #[test]
    fn total_falls_back_to_item_sum() {
        let p = build_proposal(&args(json!({
            "client": "Acme",
            "scope": "Waterline",
            "bid_items": [
                {"description": "8\" DIP", "quantity": 100, "unit": "LF", "unit_price": 42.5},
                {"description": "Mobilization", "amount": 2500}
            ]
        })))
        .unwrap();
        assert_eq!(p.bid_items[0].amount, 4250.0);
        assert_eq!(p.bid_items[1].unit, "LS");
        assert_eq!(p.total, 6750.0);
    }

    #[test]
    fn missing_total_and_items_is_invalid() {
        let err = build_proposal(&args(json!({"client": "Acme", "scope": "Waterline"}))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn tool_returns_record_with_html() {
        let out = ProposalTool
            .call(&args(json!({"client": "Acme", "scope": "Storm drain", "total": 1000})))
            .await
            .unwrap();
        assert_eq!(out["client"], "Acme");
        assert!(out["html"].as_str().unwrap().starts_with("<div"));
        assert!(out.get("bid_items").is_none());
    }
}
