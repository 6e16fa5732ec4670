use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

const MAX_POINT_STEP: usize = 1024;
const MAX_POINTS: usize = 50_000_000;

/// Error types for the PCD module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PcdError {
    /// Failed to read PCD file
    #[error("Failed to read PCD file")]
    Io(#[from] std::io::Error),

    /// Unsupported header
    #[error("Unsupported PCD property: {0}")]
    UnsupportedProperty(String),

    /// Malformed PCD header
    #[error("Malformed PCD header")]
    MalformedHeader,

    /// Malformed point record in an ascii body
    #[error("Malformed PCD point record at point {0}")]
    MalformedPoint(usize),

    /// Invalid PCD file extension
    #[error("Invalid PCD file extension. Got:{0}")]
    InvalidFileExtension(String),
}

/// Encoding of the point records after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PcdData {
    Ascii,
    Binary,
}

/// Describes a single field in a PCD point record
#[derive(Debug)]
struct PcdField {
    index: usize,  // position of the first value within a record
    offset: usize, // byte offset within a point
    size: usize,   // size of one element (bytes)
    kind: char,    // PCD type: 'F' = float, 'U' = unsigned int, 'I' = signed int
}

#[derive(Debug)]
struct PcdLayout {
    fields: HashMap<String, PcdField>,
    point_step: usize, // total bytes per point
    num_values: usize, // total values per point
    num_points: usize, // number of points
    data: PcdData,
}

impl PcdLayout {
    fn get_field(&self, name: &str) -> Result<&PcdField, PcdError> {
        self.fields
            .get(name)
            .ok_or_else(|| PcdError::UnsupportedProperty(format!("missing field {name}")))
    }
}

fn parse_list<T: std::str::FromStr>(
    it: std::str::SplitWhitespace<'_>,
    key: &str,
) -> Result<Vec<T>, PcdError> {
    it.map(|v| {
        v.parse::<T>()
            .map_err(|_| PcdError::UnsupportedProperty(format!("{key} {v}")))
    })
    .collect()
}

fn parse_pcd_layout<R: BufRead>(reader: &mut R) -> Result<PcdLayout, PcdError> {
    let mut field_names: Vec<String> = Vec::new();
    let mut sizes = Vec::new();
    let mut types = Vec::new();
    let mut counts = Vec::new();
    let mut points = 0usize;

    let data = loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Err(PcdError::MalformedHeader);
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut it = line.split_whitespace();
        match it.next() {
            Some("DATA") => match it.next() {
                Some("ascii") => break PcdData::Ascii,
                Some("binary") => break PcdData::Binary,
                other => {
                    return Err(PcdError::UnsupportedProperty(format!(
                        "DATA {}",
                        other.unwrap_or_default()
                    )))
                }
            },
            Some("SIZE") => sizes = parse_list::<usize>(it, "SIZE")?,
            Some("TYPE") => {
                types = it
                    .map(|v| v.chars().next().ok_or(PcdError::MalformedHeader))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            Some("COUNT") => counts = parse_list::<usize>(it, "COUNT")?,
            Some("POINTS") => {
                let token = it.next().ok_or(PcdError::MalformedHeader)?;
                points = token
                    .parse::<usize>()
                    .map_err(|_| PcdError::MalformedHeader)?;
            }
            Some("FIELDS") => field_names = it.map(String::from).collect(),
            _ => {}
        }
    };

    if field_names.is_empty()
        || sizes.len() != field_names.len()
        || types.len() != field_names.len()
        || (!counts.is_empty() && counts.len() != field_names.len())
    {
        return Err(PcdError::MalformedHeader);
    }

    // Compute byte offsets and value positions for each field
    let mut offset = 0usize;
    let mut index = 0usize;
    let mut fields = HashMap::new();

    for (i, name) in field_names.iter().enumerate() {
        // COUNT defaults to 1 when omitted
        let count = counts.get(i).copied().unwrap_or(1);
        let size = sizes[i];
        let kind = types[i];

        if matches!(name.as_str(), "x" | "y" | "z")
            && !(count == 1 && kind == 'F' && (size == 4 || size == 8))
        {
            return Err(PcdError::UnsupportedProperty(format!(
                "field {name} must be a single F4 or F8 value"
            )));
        }

        let field_bytes = size.checked_mul(count).ok_or(PcdError::MalformedHeader)?;

        let field = PcdField {
            index,
            offset,
            size,
            kind,
        };

        offset = offset
            .checked_add(field_bytes)
            .ok_or(PcdError::MalformedHeader)?;
        index += count;

        if offset > MAX_POINT_STEP {
            return Err(PcdError::MalformedHeader);
        }

        if fields.insert(name.clone(), field).is_some() {
            return Err(PcdError::MalformedHeader);
        }
    }

    Ok(PcdLayout {
        fields,
        point_step: offset,
        num_values: index,
        num_points: points,
        data,
    })
}

/// Read a little-endian float of the field's size from a record
#[inline]
fn read_float(buf: &[u8], field: &PcdField) -> Result<f64, PcdError> {
    let slice = buf
        .get(field.offset..field.offset + field.size)
        .ok_or(PcdError::MalformedHeader)?;
    match (field.kind, field.size) {
        ('F', 4) => {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(slice);
            Ok(f32::from_le_bytes(bytes) as f64)
        }
        ('F', 8) => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(slice);
            Ok(f64::from_le_bytes(bytes))
        }
        (kind, size) => Err(PcdError::UnsupportedProperty(format!("TYPE {kind}{size}"))),
    }
}

fn read_binary_points<R: BufRead>(
    reader: &mut R,
    layout: &PcdLayout,
    xyz: [&PcdField; 3],
) -> Result<Vec<[f64; 3]>, PcdError> {
    if layout.point_step == 0 {
        return Err(PcdError::MalformedHeader);
    }

    let mut buffer = vec![0u8; layout.point_step];
    let mut points = Vec::with_capacity(layout.num_points);

    for _ in 0..layout.num_points {
        reader.read_exact(&mut buffer)?;
        points.push([
            read_float(&buffer, xyz[0])?,
            read_float(&buffer, xyz[1])?,
            read_float(&buffer, xyz[2])?,
        ]);
    }

    Ok(points)
}

fn read_ascii_points<R: BufRead>(
    reader: &mut R,
    layout: &PcdLayout,
    xyz: [&PcdField; 3],
) -> Result<Vec<[f64; 3]>, PcdError> {
    let mut points = Vec::with_capacity(layout.num_points);
    let mut values = Vec::with_capacity(layout.num_values);

    for line in reader.lines() {
        if points.len() == layout.num_points {
            break;
        }
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        values.clear();
        for token in line.split_whitespace() {
            let v = token
                .parse::<f64>()
                .map_err(|_| PcdError::MalformedPoint(points.len()))?;
            values.push(v);
        }
        if values.len() != layout.num_values {
            return Err(PcdError::MalformedPoint(points.len()));
        }

        points.push([values[xyz[0].index], values[xyz[1].index], values[xyz[2].index]]);
    }

    if points.len() != layout.num_points {
        return Err(PcdError::MalformedPoint(points.len()));
    }

    Ok(points)
}

/// Parse the x, y and z coordinates of a PCD stream.
///
/// Both `DATA ascii` and `DATA binary` bodies are supported. Fields other than
/// x, y and z are skipped.
pub fn parse_pcd<R: BufRead>(mut reader: R) -> Result<Vec<[f64; 3]>, PcdError> {
    let layout = parse_pcd_layout(&mut reader)?;

    if layout.num_points == 0 || layout.num_points > MAX_POINTS {
        return Err(PcdError::MalformedHeader);
    }

    let xyz = [
        layout.get_field("x")?,
        layout.get_field("y")?,
        layout.get_field("z")?,
    ];

    let points = match layout.data {
        PcdData::Ascii => read_ascii_points(&mut reader, &layout, xyz)?,
        PcdData::Binary => read_binary_points(&mut reader, &layout, xyz)?,
    };

    log::debug!("parsed {} points ({:?} body)", points.len(), layout.data);

    Ok(points)
}

/// Read the points of a PCD file.
///
/// # Arguments
/// * `path` - Path to a `.pcd` file.
///
/// # Returns
/// The x, y, z coordinates of every point, in file order.
pub fn read_pcd(path: impl AsRef<Path>) -> Result<Vec<[f64; 3]>, PcdError> {
    let Some(file_ext) = path.as_ref().extension() else {
        return Err(PcdError::InvalidFileExtension("".into()));
    };

    if file_ext != "pcd" {
        return Err(PcdError::InvalidFileExtension(
            file_ext.to_string_lossy().to_string(),
        ));
    }

    let file = std::fs::File::open(path)?;
    parse_pcd(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_ascii_header() {
        let data = b"# .PCD v0.7 - Point Cloud Data file format
VERSION 0.7
FIELDS x y z intensity
SIZE 4 4 4 4
TYPE F F F F
COUNT 1 1 1 1
WIDTH 10
HEIGHT 1
VIEWPOINT 0 0 0 1 0 0 0
POINTS 10
DATA ascii
";
        let mut reader = Cursor::new(&data[..]);
        let layout = parse_pcd_layout(&mut reader).expect("valid ascii header should parse");
        assert_eq!(layout.num_points, 10);
        assert_eq!(layout.data, PcdData::Ascii);
        assert_eq!(layout.num_values, 4);
        assert_eq!(layout.point_step, 16);
        assert_eq!(layout.fields["z"].index, 2);
    }

    #[test]
    fn parses_ascii_body_with_extra_fields() -> Result<(), PcdError> {
        let data = b"FIELDS intensity x y z
SIZE 4 4 4 4
TYPE U F F F
POINTS 2
DATA ascii
7 1.0 2.0 3.0

9 -1.5 0.25 4e2
";
        let points = parse_pcd(Cursor::new(&data[..]))?;
        assert_eq!(points, vec![[1.0, 2.0, 3.0], [-1.5, 0.25, 400.0]]);
        Ok(())
    }

    #[test]
    fn parses_binary_body() -> Result<(), PcdError> {
        let mut data = b"FIELDS x y z rgb
SIZE 4 4 8 4
TYPE F F F U
COUNT 1 1 1 1
POINTS 2
DATA binary
"
        .to_vec();
        for (x, y, z) in [(1.0f32, 2.0f32, 3.0f64), (-4.0, 0.5, 6.25)] {
            data.extend_from_slice(&x.to_le_bytes());
            data.extend_from_slice(&y.to_le_bytes());
            data.extend_from_slice(&z.to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
        }
        let points = parse_pcd(Cursor::new(data))?;
        assert_eq!(points, vec![[1.0, 2.0, 3.0], [-4.0, 0.5, 6.25]]);
        Ok(())
    }

    #[test]
    fn rejects_compressed_body() {
        let data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
POINTS 1
DATA binary_compressed
";
        let mut reader = Cursor::new(&data[..]);
        assert!(matches!(
            parse_pcd_layout(&mut reader),
            Err(PcdError::UnsupportedProperty(_))
        ));
    }

    #[test]
    fn rejects_wrong_type_for_xyz() {
        let data = b"FIELDS x y z
SIZE 4 4 4
TYPE I I I
COUNT 1 1 1
POINTS 5
DATA binary
";
        let mut reader = Cursor::new(&data[..]);
        assert!(parse_pcd_layout(&mut reader).is_err());
    }

    #[test]
    fn rejects_short_ascii_body() {
        let data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
POINTS 3
DATA ascii
1 2 3
4 5 6
";
        assert!(matches!(
            parse_pcd(Cursor::new(&data[..])),
            Err(PcdError::MalformedPoint(2))
        ));
    }

    #[test]
    fn rejects_bad_ascii_token() {
        let data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
POINTS 1
DATA ascii
1 two 3
";
        assert!(matches!(
            parse_pcd(Cursor::new(&data[..])),
            Err(PcdError::MalformedPoint(0))
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let data = b"FIELDS x y z
SIZE 4 4 4
";
        let mut reader = Cursor::new(&data[..]);
        assert!(matches!(
            parse_pcd_layout(&mut reader),
            Err(PcdError::MalformedHeader)
        ));
    }
}
