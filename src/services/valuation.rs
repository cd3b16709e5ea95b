use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::{Holding, PortfolioValuation, PositionValuation};

/// Values every holding at `prices` (keyed by symbol) and adds `cash_balance`.
///
/// A holding without a price is carried at its average buy price, so it
/// contributes its cost basis and no gain.
pub fn value_portfolio(
    holdings: &[Holding],
    prices: &HashMap<String, Decimal>,
    cash_balance: Decimal,
) -> PortfolioValuation {
    let positions: Vec<PositionValuation> = holdings
        .iter()
        .filter(|h| h.shares_owned > 0)
        .map(|h| value_position(h, prices.get(&h.stock_symbol).copied()))
        .collect();

    let holdings_value: Decimal = positions.iter().map(|p| p.market_value).sum();
    let cost_basis: Decimal = positions.iter().map(|p| p.cost_basis).sum();

    PortfolioValuation {
        cash_balance,
        holdings_value,
        cost_basis,
        unrealized_gain: holdings_value - cost_basis,
        total_value: cash_balance + holdings_value,
        positions,
    }
}

fn value_position(holding: &Holding, price: Option<Decimal>) -> PositionValuation {
    let shares = Decimal::from(holding.shares_owned);
    let market_price = price.unwrap_or(holding.avg_buy_price);
    let market_value = shares * market_price;
    let cost_basis = shares * holding.avg_buy_price;
    let unrealized_gain = market_value - cost_basis;
    let unrealized_gain_pct = (!cost_basis.is_zero())
        .then(|| (unrealized_gain / cost_basis * Decimal::ONE_HUNDRED).round_dp(2));

    PositionValuation {
        symbol: holding.stock_symbol.clone(),
        stock_name: holding.stock_name.clone(),
        shares_owned: holding.shares_owned,
        avg_buy_price: holding.avg_buy_price,
        market_price,
        price_available: price.is_some(),
        market_value,
        cost_basis,
        unrealized_gain,
        unrealized_gain_pct,
    }
}
