use std::io::{Cursor, Write};

use bstr::ByteSlice;
use cqdb::{CQDBWriter, CQDB};

use super::{load_error, Reader};
use crate::error::{Error, Result};
use crate::index::{Index, IndexOptions, Indices, LabelTuple};
use crate::model::{Hyperparams, ModelState};
use crate::weights::Weights;

const MAGIC: &[u8; 4] = b"CCRF";
const VERSION: u32 = 1;

fn put_u32<W: Write>(w: &mut W, value: usize) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| Error::InvalidInput(format!("{} does not fit the model format", value)))?;
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Serialise a string index as a length-prefixed CQDB chunk
fn write_strings<W: Write>(w: &mut W, index: &Index<String>) -> Result<()> {
    put_u32(w, index.len())?;
    if index.is_empty() {
        return put_u32(w, 0);
    }
    let mut chunk = Cursor::new(Vec::new());
    {
        let mut writer = CQDBWriter::new(&mut chunk)?;
        for (id, s) in index.iter().enumerate() {
            writer.put(s, id as u32)?;
        }
        // the database is written out when the writer drops
    }
    let bytes = chunk.into_inner();
    put_u32(w, bytes.len())?;
    w.write_all(&bytes)?;
    Ok(())
}

fn read_strings(reader: &mut Reader<'_>, what: &str) -> Result<Index<String>> {
    let count = reader.u32(what)? as usize;
    let len = reader.u32(what)? as usize;
    let chunk = reader.bytes(len, what)?;
    if count == 0 {
        return Ok(Index::new());
    }
    let db = CQDB::new(chunk).map_err(|e| Error::format(format!("{}: {}", what, e)))?;
    let mut index = Index::new();
    for id in 0..count {
        let value = db
            .to_str(id as u32)
            .and_then(|s| s.to_str().ok())
            .ok_or_else(|| Error::format(format!("{}: missing entry {}", what, id)))?;
        index.get_or_insert(value.to_string());
    }
    if index.len() != count {
        return Err(Error::format(format!("{}: duplicate entries", what)));
    }
    Ok(index)
}

/// Encode a model in the binary format
pub fn to_bytes(state: &ModelState) -> Result<Vec<u8>> {
    let indices = state.indices();
    let hyper = state.hyperparams();
    let mut buf = Vec::new();
    buf.write_all(MAGIC)?;
    put_u32(&mut buf, VERSION as usize)?;
    put_u32(&mut buf, indices.window())?;

    for tuples in indices.all_label_tuples() {
        put_u32(&mut buf, tuples.len())?;
        for tuple in tuples.iter() {
            for &label in tuple.labels() {
                put_u32(&mut buf, label)?;
            }
        }
    }
    write_strings(&mut buf, indices.classes())?;
    write_strings(&mut buf, indices.features())?;
    for &order in indices.feature_type_of() {
        put_u32(&mut buf, order)?;
    }

    buf.write_all(&hyper.sigma.to_le_bytes())?;
    put_u32(&mut buf, indices.options().bits() as usize)?;
    buf.write_all(&[hyper.reverse as u8])?;
    put_u32(&mut buf, hyper.factory.len())?;
    buf.write_all(hyper.factory.as_bytes())?;

    for vector in state.weights().vectors() {
        put_u32(&mut buf, vector.len())?;
        for value in vector {
            buf.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(buf)
}

/// Decode a model written by [`to_bytes`]
pub fn from_bytes(buf: &[u8]) -> Result<ModelState> {
    let mut reader = Reader::new(buf);
    if reader.bytes(4, "magic")? != MAGIC {
        return Err(Error::format("not a chaincrf binary model"));
    }
    let version = reader.u32("version")?;
    if version != VERSION {
        return Err(Error::format(format!("unsupported version {}", version)));
    }
    let window = reader.u32("window size")? as usize;
    if window == 0 {
        return Err(Error::format("window size is 0"));
    }

    let mut label_tuples = Vec::new();
    for order in 0..window {
        let count = reader.u32("label-tuple count")? as usize;
        let mut tuples = Index::new();
        for _ in 0..count {
            let labels = (0..=order)
                .map(|_| reader.u32("label tuple").map(|l| l as usize))
                .collect::<Result<Vec<_>>>()?;
            tuples.get_or_insert(LabelTuple::new(labels));
        }
        if tuples.len() != count {
            return Err(Error::format(format!("duplicate label tuples of order {}", order)));
        }
        label_tuples.push(tuples);
    }
    let classes = read_strings(&mut reader, "class index")?;
    let features = read_strings(&mut reader, "feature index")?;
    let feature_type_of = (0..features.len())
        .map(|_| reader.u32("featureTypeOf").map(|o| o as usize))
        .collect::<Result<Vec<_>>>()?;

    let sigma = reader.f64("sigma")?;
    let bits = reader.u32("index options")?;
    let options = IndexOptions::from_bits(bits)
        .ok_or_else(|| Error::format(format!("unknown index options {:#x}", bits)))?;
    let reverse = match reader.bytes(1, "reverse flag")?[0] {
        0 => false,
        1 => true,
        b => return Err(Error::format(format!("bad reverse flag {}", b))),
    };
    let name_len = reader.u32("factory name")? as usize;
    let factory = reader
        .bytes(name_len, "factory name")?
        .to_str()
        .map_err(|e| Error::format(format!("factory name: {}", e)))?
        .to_string();

    let indices = Indices::from_parts(window, options, classes, features, label_tuples, feature_type_of)
        .map_err(load_error)?;
    let mut vectors = Vec::with_capacity(indices.num_features());
    for _ in 0..indices.num_features() {
        let len = reader.u32("weight vector length")? as usize;
        let vector = (0..len)
            .map(|_| reader.f64("weight"))
            .collect::<Result<Vec<_>>>()?;
        vectors.push(vector);
    }
    if !reader.is_done() {
        return Err(Error::format("trailing bytes after weights"));
    }
    let weights = Weights::from_vectors(&indices, vectors).map_err(load_error)?;
    let hyper = Hyperparams {
        sigma,
        reverse,
        factory,
    };
    ModelState::new(hyper, indices, weights).map_err(load_error)
}
