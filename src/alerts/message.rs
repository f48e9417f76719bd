//! Rendering of alert text for in-app notifications and email

use super::dispatcher::DispatchJob;
use crate::inventory::SeverityTier;
use crate::providers::{EmailMessage, NewNotification};

fn headline(tier: SeverityTier) -> &'static str {
    match tier {
        SeverityTier::OutOfStock => "Out of stock",
        SeverityTier::Critical => "Critically low stock",
        SeverityTier::Low => "Low stock",
        SeverityTier::Healthy => "Stock healthy",
    }
}

fn body(job: &DispatchJob) -> String {
    match job.tier {
        SeverityTier::OutOfStock => format!(
            "{} is out of stock. Reorder immediately (reorder level {}).",
            job.product_name, job.reorder_level
        ),
        _ => format!(
            "{} has {} unit{} left, at or below its reorder level of {}.",
            job.product_name,
            job.stock_quantity,
            if job.stock_quantity == 1 { "" } else { "s" },
            job.reorder_level
        ),
    }
}

/// In-app notification for a job
pub fn render_notification(job: &DispatchJob) -> NewNotification {
    NewNotification {
        recipient_id: job.recipient_id.clone(),
        product_id: job.product_id.clone(),
        tier: job.tier,
        title: format!("{}: {}", headline(job.tier), job.product_name),
        message: body(job),
    }
}

/// Email for a job addressed to `to`
pub fn render_email(job: &DispatchJob, to: &str) -> EmailMessage {
    let text = body(job);
    let html = format!(
        "<h2>{}</h2><p>{}</p><p><small>Product ID: {}</small></p>",
        escape_html(headline(job.tier)),
        escape_html(&text),
        escape_html(&job.product_id)
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("[{}] {}", headline(job.tier), job.product_name),
        html,
        text,
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
