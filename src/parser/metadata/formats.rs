use crate::metadata::ColumnFormat;

const SAS_DATE_FORMATS: &str = concat!(
    " DATE DAY DDMMYY DOWNAME JULDAY JULIAN MMDDYY MMYY MMYYC MMYYD MMYYP ",
    "MMYYS MMYYN MONNAME MONTH MONYY QTR QTRR NENGO WEEKDATE WEEKDATX WEEKDAY ",
    "WEEKV WORDDATE WORDDATX YEAR YYMM YYMMC YYMMD YYMMP YYMMS YYMMN YYMON ",
    "YYMMDD YYQ YYQC YYQD YYQP YYQS YYQN YYQR YYQRC YYQRD YYQRP YYQRS YYQRN ",
    "YYMMDDP YYMMDDC E8601DA YYMMDDN MMDDYYC MMDDYYS MMDDYYD YYMMDDS B8601DA ",
    "DDMMYYN YYMMDDD DDMMYYB DDMMYYP MMDDYYP YYMMDDB MMDDYYN DDMMYYC DDMMYYD ",
    "DDMMYYS MINGUO ",
);

const SAS_DATETIME_FORMATS: &str = concat!(
    " DATETIME DTWKDATX B8601DN B8601DT B8601DX B8601DZ B8601LX E8601DN ",
    "E8601DT E8601DX E8601DZ E8601LX DATEAMPM DTDATE DTMONYY DTMONYY DTWKDATX ",
    "DTYEAR TOD MDYAMPM ",
);

/// Shortest date or datetime format name.
pub(crate) const MIN_FORMAT_NAME_LEN: usize = 3;

/// Maps a SAS display format name onto the date or datetime column format.
pub(crate) fn classify(format_name: &[u8]) -> Option<ColumnFormat> {
    let name = std::str::from_utf8(format_name).ok()?;
    if name.is_empty() || name.contains(' ') {
        return None;
    }
    let needle = format!(" {name} ");
    if SAS_DATE_FORMATS.contains(&needle) {
        Some(ColumnFormat::Date)
    } else if SAS_DATETIME_FORMATS.contains(&needle) {
        Some(ColumnFormat::DateTime)
    } else {
        None
    }
}
