//! statement.rs
//!
//! Pure builders for the parameterized SQL the store executes. Nothing here
//! touches a connection: each builder returns the SQL text and its positional
//! arguments, in placeholder order.

use crate::asset::CryptoAsset;

/// Columns of the `asset` table as written by an insert.
pub const INSERT_ASSET: &str = "INSERT INTO asset(name, symbol, description, icoAmount, \
     blockReward, fundingStatus, foundedDate, coinType, website) \
     VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?);";

pub const INSERT_TEAM_MEMBER: &str = "INSERT INTO team_member(assetId, name) VALUES(?, ?);";

pub const DELETE_TEAM: &str = "DELETE FROM team_member WHERE assetId = ?;";

pub const ASSET_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM asset WHERE id = ?);";

const SELECT_JOINED: &str = "SELECT ca.id, ca.name, ca.symbol, ca.description, ca.icoAmount, \
     ca.blockReward, ca.fundingStatus, ca.foundedDate, ca.coinType, ca.website, \
     tm.name AS teamMember FROM asset ca LEFT JOIN team_member tm ON ca.id = tm.assetId";

/// Keeps one asset's joined rows adjacent and its members in insertion order.
const SELECT_ORDER: &str = " ORDER BY ca.id, tm.rowid;";

/// A single positional argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Text(String),
    Real(f64),
    Integer(i64),
}

/// SQL text plus its arguments in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

/// Search criteria. Values within one set are OR-ed; the sets and date bounds
/// are AND-ed. Empty sets and absent or empty dates add no condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub names: Vec<String>,
    pub symbols: Vec<String>,
    pub funding_statuses: Vec<String>,
    pub coin_types: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Accumulates `WHERE`/`AND` conditions onto a base query.
struct ConditionWriter {
    sql: String,
    args: Vec<SqlArg>,
    has_condition: bool,
}

impl ConditionWriter {
    fn new(base: &str) -> Self {
        Self {
            sql: base.to_string(),
            args: Vec::new(),
            has_condition: false,
        }
    }

    fn keyword(&mut self) {
        if self.has_condition {
            self.sql.push_str(" AND");
        } else {
            self.sql.push_str(" WHERE");
            self.has_condition = true;
        }
    }

    /// `(column = ? OR column = ? ...)`, one placeholder per value.
    fn any_of(&mut self, column: &str, values: &[String]) {
        if values.is_empty() {
            return;
        }
        self.keyword();
        let condition = format!("{column} = ?");
        let alternatives = vec![condition.as_str(); values.len()].join(" OR ");
        self.sql.push_str(" (");
        self.sql.push_str(&alternatives);
        self.sql.push(')');
        self.args.extend(values.iter().cloned().map(SqlArg::Text));
    }

    /// Dates are `YYYY-MM-DD` text, so the comparison is lexical.
    fn date_bound(&mut self, comparator: &str, date: Option<&str>) {
        let Some(date) = date.filter(|d| !d.is_empty()) else {
            return;
        };
        self.keyword();
        self.sql.push_str(&format!(" ca.foundedDate {comparator} ?"));
        self.args.push(SqlArg::Text(date.to_string()));
    }

    fn finish(mut self, suffix: &str) -> Statement {
        self.sql.push_str(suffix);
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

/// Build the search over `asset` left-joined to `team_member`. An asset with
/// N members yields N rows and one with none yields a single row whose
/// `teamMember` is NULL.
pub fn select_statement(filter: &SearchFilter) -> Statement {
    let mut writer = ConditionWriter::new(SELECT_JOINED);
    writer.any_of("ca.name", &filter.names);
    writer.any_of("ca.symbol", &filter.symbols);
    writer.any_of("ca.fundingStatus", &filter.funding_statuses);
    writer.any_of("ca.coinType", &filter.coin_types);
    writer.date_bound(">=", filter.start_date.as_deref());
    writer.date_bound("<=", filter.end_date.as_deref());
    writer.finish(SELECT_ORDER)
}

/// Build a sparse `UPDATE` setting only the scalar fields present on `asset`,
/// with `id` bound last. Returns `None` when there is no scalar field to set;
/// the team is not part of this statement.
pub fn update_statement(id: i64, asset: &CryptoAsset) -> Option<Statement> {
    let text = |value: &Option<String>| value.clone().map(SqlArg::Text);
    let real = |value: &Option<f64>| value.map(SqlArg::Real);

    let assignments = [
        ("name", text(&asset.name)),
        ("symbol", text(&asset.symbol)),
        ("description", text(&asset.description)),
        ("icoAmount", real(&asset.ico_amount)),
        ("blockReward", real(&asset.block_reward)),
        ("fundingStatus", text(&asset.funding_status)),
        ("foundedDate", text(&asset.founded_date)),
        ("coinType", text(&asset.coin_type)),
        ("website", text(&asset.website)),
    ];

    let (columns, mut args): (Vec<_>, Vec<_>) = assignments
        .into_iter()
        .filter_map(|(column, arg)| arg.map(|arg| (format!("{column} = ?"), arg)))
        .unzip();

    if columns.is_empty() {
        return None;
    }

    args.push(SqlArg::Integer(id));
    Some(Statement {
        sql: format!("UPDATE asset SET {} WHERE id = ?;", columns.join(", ")),
        args,
    })
}
