/// 금액 단위 변환
/// Money unit conversion
///
/// 도메인 전체(요청, 캐시, 주문, 큐)는 최소 화폐 단위 `i64`를 사용합니다.
/// (예: 12.34 -> 1234)
/// DB는 `NUMERIC(20,2)` 주 단위를 저장하므로 Postgres 어댑터 경계에서만 변환합니다.
/// 정밀도를 잃는 변환은 반올림하지 않고 에러로 거부합니다.
use anyhow::{bail, Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 소수점 자릿수 (NUMERIC(20,2))
pub const MINOR_UNIT_SCALE: u32 = 2;

/// 최소 단위 -> DB 금액
/// Minor units -> Decimal major units
pub fn to_decimal(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}

/// DB 금액 -> 최소 단위
/// Decimal major units -> minor units (exact only)
pub fn from_decimal(amount: Decimal) -> Result<i64> {
    let scaled = amount
        .checked_mul(Decimal::new(10_i64.pow(MINOR_UNIT_SCALE), 0))
        .context("Amount overflows minor unit range")?;

    if scaled.fract() != Decimal::ZERO {
        bail!("Amount {} has more than {} fractional digits", amount, MINOR_UNIT_SCALE);
    }

    scaled
        .to_i64()
        .context("Amount does not fit into i64 minor units")
}
