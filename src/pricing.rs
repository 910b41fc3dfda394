//! Order and cart totals.
//!
//! Totals are derived once from the captured prices when an order is placed
//! and stored on the order; nothing here is re-run for existing orders.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fixed sales tax applied to the discounted subtotal.
pub const TAX_RATE: f64 = 0.18;

/// All orders are collected in store.
pub const PICKUP_SHIPPING_COST: f64 = 0.0;

/// A percentage-off period, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Discount {
    pub percentage: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Discount {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }
}

pub fn effective_price(price: f64, discount: Option<&Discount>, now: DateTime<Utc>) -> f64 {
    match discount {
        Some(discount) if discount.is_active(now) => price * (1.0 - discount.percentage / 100.0),
        _ => price,
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LineItem {
    pub price: f64,
    pub discount: Option<Discount>,
    pub quantity: i32,
}

/// What a single line costs at `now`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PricedLine {
    pub unit_price: f64,
    /// Zero when no discount applied at `now`.
    pub discount_percentage: f64,
    pub effective_price: f64,
    pub quantity: i32,
    pub line_total: f64,
}

impl LineItem {
    pub fn price_at(&self, now: DateTime<Utc>) -> PricedLine {
        let effective = effective_price(self.price, self.discount.as_ref(), now);
        let discount_percentage = match self.discount {
            Some(discount) if discount.is_active(now) => discount.percentage,
            _ => 0.0,
        };

        PricedLine {
            unit_price: self.price,
            discount_percentage,
            effective_price: effective,
            quantity: self.quantity,
            line_total: effective * f64::from(self.quantity),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub shipping_cost: f64,
    pub total: f64,
}

pub fn totals(lines: &[PricedLine]) -> OrderTotals {
    let subtotal: f64 = lines.iter().map(|line| line.line_total).sum();
    let tax = subtotal * TAX_RATE;
    let shipping_cost = PICKUP_SHIPPING_COST;

    OrderTotals {
        subtotal,
        tax,
        shipping_cost,
        total: subtotal + shipping_cost + tax,
    }
}

pub fn compute_totals(items: &[LineItem], now: DateTime<Utc>) -> (Vec<PricedLine>, OrderTotals) {
    let lines: Vec<PricedLine> = items.iter().map(|item| item.price_at(now)).collect();
    let totals = totals(&lines);
    (lines, totals)
}
