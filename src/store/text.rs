use std::fmt::{self, Write as _};
use std::io::{Read, Write};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::feature::order_of;
use crate::index::{Index, IndexOptions, Indices, LabelTuple};
use crate::model::{Hyperparams, ModelState};
use crate::weights::Weights;

use super::load_error;

const LEVEL: i32 = 3;

fn render(state: &ModelState, out: &mut String) -> fmt::Result {
    let indices = state.indices();
    let hyper = state.hyperparams();

    writeln!(out, "labelIndices.length={}", indices.window())?;
    for (order, tuples) in indices.all_label_tuples().iter().enumerate() {
        writeln!(out, "labelIndices[{}].size()={}", order, tuples.len())?;
        for tuple in tuples.iter() {
            let labels: Vec<String> = tuple.labels().iter().map(usize::to_string).collect();
            writeln!(out, "{}", labels.join(" "))?;
        }
    }
    writeln!(out, "classIndex.size()={}", indices.num_classes())?;
    for (i, class) in indices.classes().iter().enumerate() {
        writeln!(out, "{}={}", i, class)?;
    }
    writeln!(out, "featureIndex.size()={}", indices.num_features())?;
    for (i, feature) in indices.features().iter().enumerate() {
        writeln!(out, "{}={}", i, feature)?;
    }

    writeln!(out, "<flags>")?;
    writeln!(out, "sigma={}", hyper.sigma)?;
    writeln!(out, "reverse={}", hyper.reverse)?;
    writeln!(out, "options={}", indices.options().bits())?;
    writeln!(out, "</flags>")?;
    writeln!(out, "<featureFactory> {} </featureFactory>", hyper.factory)?;
    writeln!(out, "<windowSize> {} </windowSize>", indices.window())?;

    writeln!(out, "<weights>")?;
    for vector in state.weights().vectors() {
        write!(out, "{}", vector.len())?;
        for value in vector {
            write!(out, " {}", value)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Render a model as text, uncompressed
pub fn to_text(state: &ModelState) -> String {
    let mut out = String::new();
    // formatting into a String does not fail
    let _ = render(state, &mut out);
    out
}

/// Every name is written on a line of its own
fn check_names(state: &ModelState) -> Result<()> {
    let indices = state.indices();
    let names = indices
        .classes()
        .iter()
        .map(|name| ("class", name))
        .chain(indices.features().iter().map(|name| ("feature", name)))
        .chain(std::iter::once(("feature factory", &state.hyperparams().factory)));
    for (what, name) in names {
        if name.contains(|c: char| c == '\n' || c == '\r') {
            return Err(Error::InvalidInput(format!(
                "{} name {:?} contains a line break",
                what, name
            )));
        }
    }
    Ok(())
}

/// Compress and write a model; names containing line breaks are refused
pub fn write<W: Write>(state: &ModelState, mut w: W) -> Result<()> {
    check_names(state)?;
    let compressed = zstd::stream::encode_all(to_text(state).as_bytes(), LEVEL)?;
    w.write_all(&compressed)?;
    w.flush()?;
    Ok(())
}

/// Read a compressed model written by [`write`]
pub fn read<R: Read>(r: R) -> Result<ModelState> {
    let raw = zstd::stream::decode_all(r)
        .map_err(|e| Error::format(format!("decompression failed: {}", e)))?;
    let text = String::from_utf8(raw).map_err(|e| Error::format(e.to_string()))?;
    from_text(&text)
}

/// Line cursor that reports errors with 1-based line numbers
struct Lines<'a> {
    inner: std::str::Lines<'a>,
    line: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.lines(),
            line: 0,
        }
    }

    fn error(&self, msg: impl std::fmt::Display) -> Error {
        Error::format(format!("line {}: {}", self.line, msg))
    }

    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.line += 1;
        self.inner
            .next()
            .ok_or_else(|| self.error(format!("unexpected end of file, expected {}", what)))
    }

    fn parse<T: FromStr>(&self, s: &str, what: &str) -> Result<T> {
        s.trim()
            .parse()
            .map_err(|_| self.error(format!("bad {} {:?}", what, s)))
    }

    /// `key=value` with a fixed key
    fn field<T: FromStr>(&mut self, key: &str) -> Result<T> {
        let line = self.next(key)?;
        match line.split_once('=') {
            Some((k, v)) if k == key => self.parse(v, key),
            _ => Err(self.error(format!("expected {}=, found {:?}", key, line))),
        }
    }

    /// `<tag> value </tag>` on one line
    fn tagged(&mut self, tag: &str) -> Result<&'a str> {
        let line = self.next(tag)?;
        let open = format!("<{}>", tag);
        let close = format!("</{}>", tag);
        line.strip_prefix(open.as_str())
            .and_then(|rest| rest.strip_suffix(close.as_str()))
            .map(str::trim)
            .ok_or_else(|| self.error(format!("expected {}...{}", open, close)))
    }

    fn require(&mut self, expected: &str) -> Result<()> {
        let line = self.next(expected)?;
        if line != expected {
            return Err(self.error(format!("expected {}, found {:?}", expected, line)));
        }
        Ok(())
    }

    /// `size` lines of `i=value`, numbered from 0
    fn string_index(&mut self, size: usize, what: &str) -> Result<Index<String>> {
        let mut index = Index::new();
        for i in 0..size {
            let line = self.next(what)?;
            let (id, value) = line
                .split_once('=')
                .ok_or_else(|| self.error(format!("expected {} entry {}=...", what, i)))?;
            let id: usize = self.parse(id, "entry number")?;
            if id != i {
                return Err(self.error(format!("{} entry {} out of order, expected {}", what, id, i)));
            }
            if index.get_or_insert(value.to_string()) != i {
                return Err(self.error(format!("duplicate {} entry {:?}", what, value)));
            }
        }
        Ok(index)
    }
}

/// Parse an uncompressed model
pub fn from_text(text: &str) -> Result<ModelState> {
    let mut lines = Lines::new(text);

    let window: usize = lines.field("labelIndices.length")?;
    if window == 0 {
        return Err(lines.error("window size is 0"));
    }
    let mut label_tuples = Vec::new();
    for order in 0..window {
        let size: usize = lines.field(&format!("labelIndices[{}].size()", order))?;
        let mut tuples = Index::new();
        for i in 0..size {
            let line = lines.next("label tuple")?;
            let labels = line
                .split_whitespace()
                .map(|l| lines.parse::<usize>(l, "label"))
                .collect::<Result<Vec<_>>>()?;
            if labels.len() != order + 1 {
                return Err(lines.error(format!(
                    "label tuple of order {} has {} labels",
                    order,
                    labels.len()
                )));
            }
            if tuples.get_or_insert(LabelTuple::new(labels)) != i {
                return Err(lines.error("duplicate label tuple"));
            }
        }
        label_tuples.push(tuples);
    }

    let num_classes: usize = lines.field("classIndex.size()")?;
    let classes = lines.string_index(num_classes, "class")?;
    let num_features: usize = lines.field("featureIndex.size()")?;
    let features = lines.string_index(num_features, "feature")?;

    lines.require("<flags>")?;
    let (mut sigma, mut reverse, mut options) = (None, None, None);
    loop {
        let line = lines.next("</flags>")?;
        if line == "</flags>" {
            break;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| lines.error(format!("bad flag {:?}", line)))?;
        match key {
            "sigma" => sigma = Some(lines.parse::<f64>(value, "sigma")?),
            "reverse" => reverse = Some(lines.parse::<bool>(value, "reverse")?),
            "options" => {
                let bits = lines.parse::<u32>(value, "options")?;
                let parsed = IndexOptions::from_bits(bits)
                    .ok_or_else(|| lines.error(format!("unknown index options {:#x}", bits)))?;
                options = Some(parsed);
            }
            // flags this version does not use
            _ => tracing::debug!("ignoring model flag {}", key),
        }
    }
    let factory = lines.tagged("featureFactory")?.to_string();
    let window_size: usize = {
        let value = lines.tagged("windowSize")?;
        lines.parse(value, "window size")?
    };
    if window_size != window {
        return Err(lines.error(format!(
            "window size {} does not match {} label indices",
            window_size, window
        )));
    }

    let feature_type_of = features
        .iter()
        .map(|name| order_of(name, window))
        .collect::<Result<Vec<_>>>()
        .map_err(load_error)?;
    let indices = Indices::from_parts(
        window,
        options.unwrap_or_default(),
        classes,
        features,
        label_tuples,
        feature_type_of,
    )
    .map_err(load_error)?;

    lines.require("<weights>")?;
    let mut vectors = Vec::with_capacity(indices.num_features());
    for f in 0..indices.num_features() {
        let line = lines.next("weight vector")?;
        let mut fields = line.split_whitespace();
        let len: usize = lines.parse(fields.next().unwrap_or(""), "vector length")?;
        let vector = fields
            .map(|v| lines.parse::<f64>(v, "weight"))
            .collect::<Result<Vec<_>>>()?;
        let expected = indices.label_tuples(indices.feature_type_of()[f]).len();
        if vector.len() != len || len != expected {
            return Err(lines.error(format!(
                "weight vector of feature {} has {} values, expected {}",
                f,
                vector.len(),
                expected
            )));
        }
        vectors.push(vector);
    }
    while let Some(rest) = lines.inner.next() {
        lines.line += 1;
        if !rest.trim().is_empty() {
            return Err(lines.error("trailing data after weights"));
        }
    }

    let weights = Weights::from_vectors(&indices, vectors).map_err(load_error)?;
    let hyper = Hyperparams {
        sigma: sigma.ok_or_else(|| Error::format("missing sigma flag"))?,
        reverse: reverse.unwrap_or(false),
        factory,
    };
    ModelState::new(hyper, indices, weights).map_err(load_error)
}
