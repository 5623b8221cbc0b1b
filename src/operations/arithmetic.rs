//! Pure decimal arithmetic
//!
//! `None` means the result does not fit in a `Decimal`.

use rust_decimal::Decimal;

pub fn add(a: Decimal, b: Decimal) -> Option<Decimal> {
    a.checked_add(b)
}

pub fn subtract(a: Decimal, b: Decimal) -> Option<Decimal> {
    a.checked_sub(b)
}

pub fn square(number: Decimal) -> Option<Decimal> {
    number.checked_mul(number)
}
