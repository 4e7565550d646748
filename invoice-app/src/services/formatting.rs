//! Money, date and email body formatting for outgoing invoices.

use askama::Template;
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

/// Symbol and minor-unit digits for the currencies with a dedicated sign.
fn currency_style(code: &str) -> Option<(&'static str, u32)> {
    let style = match code {
        "USD" => ("$", 2),
        "EUR" => ("€", 2),
        "GBP" => ("£", 2),
        "INR" => ("₹", 2),
        "JPY" => ("¥", 0),
        "KRW" => ("₩", 0),
        "CNY" => ("CN¥", 2),
        "CAD" => ("CA$", 2),
        "AUD" => ("A$", 2),
        "NZD" => ("NZ$", 2),
        "BRL" => ("R$", 2),
        "MXN" => ("MX$", 2),
        "ILS" => ("₪", 2),
        "VND" => ("₫", 0),
        _ => return None,
    };
    Some(style)
}

/// en-US style amount: `$1,234.50`, `-€10.00`, `CHF 99.90`.
pub fn format_currency(amount: Decimal, currency: &str) -> String {
    let code = currency.trim().to_ascii_uppercase();
    let (prefix, digits) = match currency_style(&code) {
        Some((symbol, digits)) => (symbol.to_string(), digits),
        None => (format!("{} ", code), 2),
    };

    let rounded = amount.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let plain = format!("{:.*}", digits as usize, rounded.abs());
    let (whole, fraction) = match plain.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (plain.as_str(), None),
    };

    let mut out = format!("{}{}{}", sign, prefix, group_thousands(whole));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Long date with ordinal day: `October 16th, 2026`.
pub fn format_long_date(date: NaiveDate) -> String {
    format!(
        "{} {}{}, {}",
        date.format("%B"),
        date.day(),
        ordinal_suffix(date.day()),
        date.year()
    )
}

/// Values substituted into the invoice email.
#[derive(Debug, Clone)]
pub struct InvoiceEmail<'a> {
    pub client_name: &'a str,
    pub invoice_no: &'a str,
    pub due_date: NaiveDate,
    pub total: Decimal,
    pub currency: &'a str,
    pub payment_link: &'a str,
}

#[derive(Template)]
#[template(path = "email/invoice.html")]
struct InvoiceHtml<'a> {
    email: &'a InvoiceEmail<'a>,
}

#[derive(Template)]
#[template(path = "email/invoice.txt")]
struct InvoiceText<'a> {
    email: &'a InvoiceEmail<'a>,
}

impl InvoiceEmail<'_> {
    pub fn amount(&self) -> String {
        format_currency(self.total, self.currency)
    }

    pub fn due(&self) -> String {
        format_long_date(self.due_date)
    }

    pub fn render_text(&self) -> Result<String, askama::Error> {
        InvoiceText { email: self }.render()
    }

    /// HTML body; every substituted value is escaped by the template.
    pub fn render_html(&self) -> Result<String, askama::Error> {
        InvoiceHtml { email: self }.render()
    }
}
