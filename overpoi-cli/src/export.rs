//! GeoJSON and CSV writers for acquired records.
//!
//! Both formats hold one entry per record across all categories, in
//! request order. Failed categories contribute nothing.

use std::io::{BufWriter, Write};

use camino::Utf8Path;
use overpoi_core::{CategoryCatalog, CategoryResultSet, PoiRecord};
use geojson::{
    Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value as GeometryValue,
};

use crate::CliError;
use crate::fs::create_utf8_file;

const CSV_HEADER: [&str; 11] = [
    "category",
    "osm_type",
    "osm_id",
    "name",
    "type",
    "latitude",
    "longitude",
    "address",
    "phone",
    "website",
    "opening_hours",
];

/// Build a GeoJSON `FeatureCollection` with one point feature per record.
pub(crate) fn feature_collection(
    results: &[CategoryResultSet],
    catalog: &CategoryCatalog,
) -> FeatureCollection {
    let features = results
        .iter()
        .flat_map(|result| result.records().iter())
        .map(|record| feature(record, catalog))
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn feature(record: &PoiRecord, catalog: &CategoryCatalog) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("osm_id".into(), JsonValue::from(record.id));
    properties.insert("osm_type".into(), JsonValue::from(record.kind.as_str()));
    properties.insert("category".into(), JsonValue::from(record.category.as_str()));
    properties.insert("name".into(), JsonValue::from(record.name()));
    properties.insert("type".into(), JsonValue::from(record.poi_type()));
    if let Some(definition) = catalog.get(&record.category) {
        properties.insert("group".into(), JsonValue::from(definition.group.as_str()));
        properties.insert(
            "color".into(),
            JsonValue::from(definition.display_color.as_str()),
        );
    }
    let mut tags: Vec<(&String, &String)> = record.tags.iter().collect();
    tags.sort();
    properties.insert(
        "tags".into(),
        JsonValue::Object(
            tags.into_iter()
                .map(|(key, value)| (key.clone(), JsonValue::String(value.clone())))
                .collect(),
        ),
    );
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeometryValue::Point(vec![
            record.longitude(),
            record.latitude(),
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Write `results` as GeoJSON to `path`.
pub(crate) fn write_geojson(
    path: &Utf8Path,
    results: &[CategoryResultSet],
    catalog: &CategoryCatalog,
) -> Result<(), CliError> {
    let collection = feature_collection(results, catalog);
    let file = create_utf8_file(path).map_err(|source| write_error(path, source))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &collection).map_err(|source| {
        CliError::SerialiseGeoJson {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|source| write_error(path, source))
}

/// Write `results` as CSV to `writer`.
pub(crate) fn write_csv_to(
    writer: &mut dyn Write,
    results: &[CategoryResultSet],
) -> std::io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER.join(","))?;
    for record in results.iter().flat_map(|result| result.records().iter()) {
        let id = record.id.to_string();
        let latitude = record.latitude().to_string();
        let longitude = record.longitude().to_string();
        let row = [
            record.category.as_str(),
            record.kind.as_str(),
            id.as_str(),
            record.name(),
            record.poi_type(),
            latitude.as_str(),
            longitude.as_str(),
            record.address().unwrap_or_default(),
            record.phone().unwrap_or_default(),
            record.website().unwrap_or_default(),
            record.opening_hours().unwrap_or_default(),
        ];
        let escaped: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        writeln!(writer, "{}", escaped.join(","))?;
    }
    Ok(())
}

/// Write `results` as CSV to `path`.
pub(crate) fn write_csv(path: &Utf8Path, results: &[CategoryResultSet]) -> Result<(), CliError> {
    let file = create_utf8_file(path).map_err(|source| write_error(path, source))?;
    let mut writer = BufWriter::new(file);
    write_csv_to(&mut writer, results)
        .and_then(|()| writer.flush())
        .map_err(|source| write_error(path, source))
}

/// Quote a field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn write_error(path: &Utf8Path, source: std::io::Error) -> CliError {
    CliError::WriteExport {
        path: path.to_path_buf(),
        source,
    }
}
