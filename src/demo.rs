//! Example wiring: add `NUMBER1` and `NUMBER2` from the environment.

use crate::{env::EnvManager, error::AppError, logger::Logger};

pub const NUMBER1: &str = "NUMBER1";
pub const NUMBER2: &str = "NUMBER2";

/// Read both numbers (defaults `10` and `5`), log them and their sum.
///
/// Never fails: conversion and lookup errors are logged and yield `None`.
pub fn add_numbers(env: &EnvManager, logger: &Logger) -> Option<i64> {
    match read_numbers(env) {
        Ok((a, b)) => {
            logger.info(format_args!(
                "Retrieved environment variables: {NUMBER1}={a}, {NUMBER2}={b}"
            ));
            match a.checked_add(b) {
                Some(sum) => {
                    logger.info(format_args!("The result of adding {a} and {b} is {sum}"));
                    Some(sum)
                }
                None => {
                    logger.error(format_args!("Adding {a} and {b} overflows"));
                    None
                }
            }
        }
        Err(e @ AppError::Conversion { .. }) => {
            logger.error(format_args!(
                "Error converting environment variables to integers: {e}"
            ));
            None
        }
        Err(e) => {
            logger.error(format_args!("An unexpected error occurred: {e}"));
            None
        }
    }
}

fn read_numbers(env: &EnvManager) -> Result<(i64, i64), AppError> {
    let first = env.get_env_variable(NUMBER1, Some("10"))?;
    let second = env.get_env_variable(NUMBER2, Some("5"))?;
    let a: i64 = first.parse(NUMBER1)?;
    let b: i64 = second.parse(NUMBER2)?;
    Ok((a, b))
}
