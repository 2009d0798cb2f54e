/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Unix millis → 本地日期 (`YYYYMMDD` 数字形式)
///
/// 订单号与每日流水号按本地自然日切分。
pub fn local_date_number(millis: i64) -> u64 {
    local_date(millis)
        .format("%Y%m%d")
        .to_string()
        .parse()
        .unwrap_or(0)
}

/// Unix millis → 本地日期
pub fn local_date(millis: i64) -> chrono::NaiveDate {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .with_timezone(&chrono::Local)
        .date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_date_number_has_eight_digits() {
        let n = local_date_number(now_millis());
        assert!((19_700_101..=99_991_231).contains(&n));
    }
}
