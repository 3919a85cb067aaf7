use mssql_featureset::{
    AttributeType, ConnectionHandle, LayerDescriptor, MssqlFeatureset, SqliteConnection, Value,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use wkt::to_wkt::write_geometry;

const USAGE: &str = "Usage: dump_features <path-to-sqlite | odbc:connection-string> <query> \
                     <column:type>... (set MSSQL_ENCODING to override the utf-8 text encoding)";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("dump_features failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let source = args.next().ok_or(USAGE)?;
    let query = args.next().ok_or(USAGE)?;
    let encoding = std::env::var("MSSQL_ENCODING").unwrap_or_else(|_| "utf-8".to_string());

    let mut descriptor = LayerDescriptor::new(encoding);
    for column in args {
        let (name, type_name) = column
            .split_once(':')
            .ok_or_else(|| format!("invalid column spec '{column}': {USAGE}"))?;
        descriptor = descriptor.with_attribute(name, AttributeType::from_sql_type_name(type_name));
    }
    if descriptor.descriptors.is_empty() {
        return Err(USAGE.into());
    }

    if let Some(connection_string) = source.strip_prefix("odbc:") {
        return dump_odbc(connection_string, &query, &descriptor);
    }
    let conn = SqliteConnection::open_read_only(source)?;
    dump(&conn, &query, &descriptor)
}

#[cfg(feature = "odbc")]
fn dump_odbc(
    connection_string: &str,
    query: &str,
    descriptor: &LayerDescriptor,
) -> Result<(), Box<dyn std::error::Error>> {
    let env = odbc_api::Environment::new()?;
    let conn = env
        .connect_with_connection_string(connection_string, odbc_api::ConnectionOptions::default())?;
    dump(&conn, query, descriptor)
}

#[cfg(not(feature = "odbc"))]
fn dump_odbc(
    _connection_string: &str,
    _query: &str,
    _descriptor: &LayerDescriptor,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `odbc` feature".into())
}

fn dump<C: ConnectionHandle>(
    conn: &C,
    query: &str,
    descriptor: &LayerDescriptor,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut features = MssqlFeatureset::new(conn, query, descriptor)?;

    loop {
        let feature = match features.next_feature() {
            Ok(Some(feature)) => feature,
            Ok(None) => break,
            Err(err) if features.is_finished() => return Err(err.into()),
            Err(err) => {
                warn!("skipping row: {err}");
                continue;
            }
        };

        let mut values = Vec::with_capacity(descriptor.descriptors.len());
        for (name, value) in feature.attributes() {
            values.push(format!("{name}={}", format_value(value)));
        }
        for geometry in feature.geometries() {
            let mut wkt = String::new();
            write_geometry(&mut wkt, geometry)?;
            values.push(wkt);
        }
        println!("feature {}: {}", feature.id(), values.join(", "));
    }

    Ok(())
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(Value::String(value)) => format!("{value:?}"),
        Some(value) => value.to_string(),
    }
}
