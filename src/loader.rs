//! Ingestion of the bank operations export, as CSV or as a spreadsheet
//! workbook.

use crate::errors::Result;
use crate::models::{OPERATION_DATE_FORMAT, Operation, RawAmount};
use anyhow::Context;
use calamine::{Data, DataType, Reader, open_workbook_auto};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, error, info};

/// Sheet the bank puts its operations on; the first sheet is read when a
/// workbook has no sheet by that name.
pub const OPERATIONS_SHEET: &str = "Отчет по операциям";

const PAYMENT_DATE_FORMAT: &str = "%d.%m.%Y";
const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// Deserialize every row of an export; rows that do not deserialize are
/// logged and dropped, the rest of the file still loads.
pub fn read_operations<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Operation>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut ops = Vec::new();
    for (idx, row) in rdr.deserialize::<Operation>().enumerate() {
        match row {
            Ok(op) => ops.push(op),
            Err(e) => error!(row = idx + 1, %e, "csv-deserialize"),
        }
    }
    Ok(ops)
}

/// Open `path` and load its operations. Workbooks are recognised by
/// extension; anything else is read as CSV split on `delimiter`.
pub fn load_operations(path: impl AsRef<Path>, delimiter: u8) -> Result<Vec<Operation>> {
    let path = path.as_ref();
    let ops = if is_workbook(path) {
        read_workbook(path)?
    } else {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        read_operations(file, delimiter)?
    };
    info!("Loaded {} operations from {}", ops.len(), path.display());
    Ok(ops)
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| WORKBOOK_EXTENSIONS.iter().any(|w| e.eq_ignore_ascii_case(w)))
}

/// Load the operations sheet of a workbook. The first row is the header.
pub fn read_workbook(path: &Path) -> Result<Vec<Operation>> {
    let mut workbook = open_workbook_auto(path).with_context(|| format!("opening {}", path.display()))?;

    let names = workbook.sheet_names();
    let sheet = names
        .iter()
        .find(|n| n.as_str() == OPERATIONS_SHEET)
        .or_else(|| names.first())
        .cloned()
        .with_context(|| format!("{} has no sheets", path.display()))?;
    debug!(%sheet, "reading workbook sheet");

    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet {sheet:?} of {}", path.display()))?;
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    Ok(operations_from_rows(header, rows))
}

/// Map sheet rows onto [`Operation`]s by header name. Columns with an
/// unknown header are ignored; blank rows are dropped.
pub fn operations_from_rows<'a>(header: &[Data], rows: impl Iterator<Item = &'a [Data]>) -> Vec<Operation> {
    let columns: Vec<Option<Column>> = header
        .iter()
        .map(|cell| plain_text(cell).and_then(|h| Column::from_header(&h)))
        .collect();

    rows.filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            let mut op = Operation::default();
            for (column, cell) in columns.iter().zip(row) {
                if let Some(column) = column {
                    column.assign(&mut op, cell);
                }
            }
            op
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Column {
    OperationDate,
    PaymentDate,
    CardNumber,
    Status,
    OperationAmount,
    OperationCurrency,
    PaymentAmount,
    PaymentCurrency,
    Cashback,
    Category,
    Mcc,
    Description,
}

impl Column {
    fn from_header(name: &str) -> Option<Self> {
        let column = match name.trim() {
            "Дата операции" | "operation_date" => Column::OperationDate,
            "Дата платежа" | "payment_date" => Column::PaymentDate,
            "Номер карты" | "card_number" => Column::CardNumber,
            "Статус" | "status" => Column::Status,
            "Сумма операции" | "operation_amount" => Column::OperationAmount,
            "Валюта операции" | "operation_currency" => Column::OperationCurrency,
            "Сумма платежа" | "payment_amount" => Column::PaymentAmount,
            "Валюта платежа" | "payment_currency" => Column::PaymentCurrency,
            "Кэшбэк" | "cashback" => Column::Cashback,
            "Категория" | "category" => Column::Category,
            "MCC" | "mcc" => Column::Mcc,
            "Описание" | "description" => Column::Description,
            _ => return None,
        };
        Some(column)
    }

    fn assign(self, op: &mut Operation, cell: &Data) {
        match self {
            Column::OperationDate => op.operation_date = cell_text(cell, OPERATION_DATE_FORMAT),
            Column::PaymentDate => op.payment_date = plain_text(cell),
            Column::CardNumber => op.card_number = plain_text(cell),
            Column::Status => op.status = plain_text(cell),
            Column::OperationAmount => op.operation_amount = cell_amount(cell),
            Column::OperationCurrency => op.operation_currency = plain_text(cell),
            Column::PaymentAmount => op.payment_amount = cell_amount(cell),
            Column::PaymentCurrency => op.payment_currency = plain_text(cell),
            Column::Cashback => op.cashback = cell_amount(cell),
            Column::Category => op.category = plain_text(cell),
            Column::Mcc => op.mcc = plain_text(cell),
            Column::Description => op.description = plain_text(cell),
        }
    }
}

/// Cell as the text a CSV export would carry; date cells are written in
/// `date_format`.
fn cell_text(cell: &Data, date_format: &str) -> Option<String> {
    match cell {
        Data::String(s) => Some(s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell.as_datetime().map(|d| d.format(date_format).to_string()),
        Data::DurationIso(s) => Some(s.clone()),
        Data::Error(_) | Data::Empty => None,
    }
}

/// Dates here are day-precision, as in `Дата платежа`.
fn plain_text(cell: &Data) -> Option<String> {
    cell_text(cell, PAYMENT_DATE_FORMAT)
}

fn cell_amount(cell: &Data) -> Option<RawAmount> {
    match cell {
        Data::Float(f) => Some(RawAmount::from_f64(*f)),
        Data::Int(i) => Some(RawAmount::Number(Decimal::from(*i))),
        _ => plain_text(cell).map(RawAmount::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const EXPORT: &str = "\
Дата операции,Дата платежа,Номер карты,Статус,Сумма операции,Валюта операции,Сумма платежа,Валюта платежа,Кэшбэк,Категория,MCC,Описание
31.12.2021 16:44:00,31.12.2021,*7197,OK,-160.89,RUB,-160.89,RUB,,Супермаркеты,5411,Колхоз
31.12.2021 16:42:04,31.12.2021,*7197,OK,-64.00,RUB,-64.00,RUB,,Супермаркеты,5411,Колхоз
30.12.2021 17:50:17,30.12.2021,,OK,174000.00,RUB,174000.00,RUB,,Пополнения,,Перевод
";

    #[test]
    fn reads_export_rows() {
        let ops = read_operations(EXPORT.as_bytes(), b',').unwrap();
        assert_eq!(ops.len(), 3);

        assert_eq!(ops[0].operation_value(), Some(dec!(-160.89)));
        assert_eq!(ops[0].card(), Some("*7197"));
        assert_eq!(ops[0].category.as_deref(), Some("Супермаркеты"));
        assert_eq!(ops[2].card(), None);
        assert_eq!(ops[2].cashback, None);
        assert!(ops[1].operation_datetime().is_some());
    }

    #[test]
    fn semicolon_exports_and_missing_columns() {
        let data = "Дата операции;Сумма операции;Лишнее\n01.12.2021 10:00:00;oops;x\n;-5;y\n";
        let ops = read_operations(data.as_bytes(), b';').unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation_amount, Some(RawAmount::from("oops")));
        assert_eq!(ops[0].operation_value(), None);
        assert_eq!(ops[1].operation_date, None);
        assert_eq!(ops[1].description, None);
    }

    #[test]
    fn load_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(EXPORT.as_bytes()).unwrap();
        let ops = load_operations(f.path(), b',').unwrap();
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_operations("/definitely/not/here.csv", b',').is_err());
        assert!(load_operations("/definitely/not/here.xlsx", b',').is_err());
    }

    #[test]
    fn workbook_extensions() {
        assert!(is_workbook(Path::new("operations.xlsx")));
        assert!(is_workbook(Path::new("data/OPERATIONS.XLSX")));
        assert!(is_workbook(Path::new("operations.ods")));
        assert!(!is_workbook(Path::new("operations.csv")));
        assert!(!is_workbook(Path::new("operations")));
    }

    #[test]
    fn sheet_rows_map_by_header() {
        let header = vec![
            Data::String("Дата операции".into()),
            Data::String("Номер карты".into()),
            Data::String("Сумма операции".into()),
            Data::String("Кэшбэк".into()),
            Data::String("Категория".into()),
            Data::String("MCC".into()),
            Data::String("Неизвестно".into()),
        ];
        let rows = vec![
            vec![
                Data::String("31.12.2021 16:44:00".into()),
                Data::String("*7197".into()),
                Data::Float(-160.89),
                Data::Empty,
                Data::String("Супермаркеты".into()),
                Data::Float(5411.0),
                Data::Int(1),
            ],
            vec![
                Data::DateTimeIso("2021-12-30T17:50:17".into()),
                Data::Empty,
                Data::Int(174000),
                Data::Float(3.0),
                Data::String(" ".into()),
            ],
            vec![Data::Empty; 7],
            vec![
                Data::String("01.12.2021 10:00:00".into()),
                Data::Empty,
                Data::String("-5.50".into()),
            ],
        ];

        let ops = operations_from_rows(&header, rows.iter().map(Vec::as_slice));
        assert_eq!(ops.len(), 3);

        assert_eq!(ops[0].operation_amount, Some(RawAmount::Number(dec!(-160.89))));
        assert_eq!(ops[0].card(), Some("*7197"));
        assert_eq!(ops[0].cashback, None);
        assert_eq!(ops[0].mcc.as_deref(), Some("5411"));
        assert_eq!(ops[0].category.as_deref(), Some("Супермаркеты"));
        assert!(ops[0].operation_datetime().is_some());

        assert_eq!(ops[1].operation_date.as_deref(), Some("30.12.2021 17:50:17"));
        assert_eq!(ops[1].operation_value(), Some(dec!(174000)));
        assert_eq!(ops[1].cashback, Some(RawAmount::Number(dec!(3))));
        assert_eq!(ops[1].category, None);
        assert_eq!(ops[1].card(), None);

        assert_eq!(ops[2].operation_amount, Some(RawAmount::from("-5.50")));
        assert_eq!(ops[2].operation_value(), Some(dec!(-5.50)));
    }

    #[test]
    fn header_only_sheet_is_empty() {
        let header = vec![Data::String("Дата операции".into())];
        assert!(operations_from_rows(&header, std::iter::empty()).is_empty());
    }
}
