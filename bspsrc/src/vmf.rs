//! Writer for Hammer's nested `name { "key" "value" }` map format.

use std::{
    fmt::Display,
    io::{self, Write},
};

use glam::Vec3;

use crate::texture::{Texture, TextureAxis};

const NEWLINE: &str = "\r\n";

/// Brackets around a vector value
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VecStyle {
    Plain,
    Paren,
    Bracket,
}

/// Streams map text into `W`. The first IO error is kept and returned by
/// [`VmfWriter::finish`], later writes are dropped.
pub struct VmfWriter<W: Write> {
    out: Option<W>,
    sections: Vec<String>,
    error: Option<io::Error>,
}

impl<W: Write> VmfWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Some(out),
            sections: Vec::new(),
            error: None,
        }
    }

    fn write(&mut self, args: std::fmt::Arguments) {
        if self.error.is_some() {
            return;
        }
        if let Some(out) = self.out.as_mut() {
            if let Err(e) = out.write_fmt(args) {
                self.error = Some(e);
            }
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.sections.len() {
            self.write(format_args!("\t"));
        }
    }

    pub fn depth(&self) -> usize {
        self.sections.len()
    }

    pub fn start(&mut self, name: &str) {
        self.indent();
        self.write(format_args!("{name}{NEWLINE}"));
        self.indent();
        self.write(format_args!("{{{NEWLINE}"));
        self.sections.push(name.to_owned());
    }

    /// Closes the innermost section, which must be `name`
    pub fn end(&mut self, name: &str) {
        let Some(open) = self.sections.pop() else {
            panic!("closing section {name:?} with no open sections");
        };
        assert_eq!(open, name, "section end name mismatch");
        self.indent();
        self.write(format_args!("}}{NEWLINE}"));
    }

    pub fn put(&mut self, key: &str, value: impl Display) {
        self.indent();
        self.write(format_args!("\"{key}\" \"{value}\"{NEWLINE}"));
    }

    pub fn put_float(&mut self, key: &str, value: f64) {
        self.put(key, format_float(value));
    }

    pub fn put_bool(&mut self, key: &str, value: bool) {
        self.put(key, if value { 1 } else { 0 });
    }

    pub fn put_vec(&mut self, key: &str, v: Vec3) {
        self.put(key, format_vec(v, VecStyle::Plain));
    }

    pub fn put_vec_styled(&mut self, key: &str, v: Vec3, style: VecStyle) {
        self.put(key, format_vec(v, style));
    }

    /// Three points in parentheses, the way Hammer stores side planes
    pub fn put_plane(&mut self, key: &str, plane: [Vec3; 3]) {
        let [a, b, c] = plane.map(|p| format_vec(p, VecStyle::Paren));
        self.put(key, format_args!("{a} {b} {c}"));
    }

    pub fn put_axis(&mut self, key: &str, axis: &TextureAxis) {
        self.put(key, format_axis(axis));
    }

    pub fn put_texture(&mut self, texture: &Texture) {
        self.put("material", texture.name());
        self.put_axis("uaxis", &texture.u);
        self.put_axis("vaxis", &texture.v);
        self.put("lightmapscale", texture.lightmap_scale);
    }

    /// Flushes and hands back the output. Open sections are logged, the
    /// partial file is still worth keeping.
    pub fn finish(mut self) -> io::Result<W> {
        self.warn_unclosed();
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let mut out = self
            .out
            .take()
            .ok_or_else(|| io::Error::other("writer already finished"))?;
        out.flush()?;
        Ok(out)
    }

    fn warn_unclosed(&mut self) {
        if !self.sections.is_empty() {
            log::warn!("Unclosed VMF section: {}", self.sections.join(" -> "));
            self.sections.clear();
        }
    }
}

impl<W: Write> Drop for VmfWriter<W> {
    fn drop(&mut self) {
        self.warn_unclosed();
        if let Some(out) = self.out.as_mut() {
            let _ = out.flush();
        }
    }
}

/// Up to four decimals, no trailing zeros
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        log::warn!("Invalid number {value}");
        return "0".to_owned();
    }
    let s = format!("{value:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_owned(),
        s => s.to_owned(),
    }
}

pub fn format_vec(v: Vec3, style: VecStyle) -> String {
    let inner = if v.is_finite() {
        format!(
            "{} {} {}",
            format_float(v.x as f64),
            format_float(v.y as f64),
            format_float(v.z as f64)
        )
    } else {
        log::warn!("Invalid vector {v}");
        "0 0 0".to_owned()
    };
    match style {
        VecStyle::Plain => inner,
        VecStyle::Paren => format!("({inner})"),
        VecStyle::Bracket => format!("[{inner}]"),
    }
}

fn format_axis(axis: &TextureAxis) -> String {
    let v = if axis.axis.is_finite() {
        axis.axis
    } else {
        log::warn!("Invalid texture axis {}", axis.axis);
        Vec3::ZERO
    };
    format!(
        "[{} {}] {}",
        format_vec(v, VecStyle::Plain),
        axis.shift,
        format_float(axis.scale as f64)
    )
}

#[cfg(test)]
mod vmf_tests {
    use super::*;

    fn text(w: VmfWriter<Vec<u8>>) -> String {
        String::from_utf8(w.finish().unwrap()).unwrap()
    }

    #[test]
    fn nested_sections() {
        let mut w = VmfWriter::new(Vec::new());
        w.start("world");
        w.put("id", 1);
        w.start("solid");
        w.put_bool("visible", true);
        w.end("solid");
        w.end("world");
        assert_eq!(w.depth(), 0);
        assert_eq!(
            text(w),
            "world\r\n{\r\n\t\"id\" \"1\"\r\n\tsolid\r\n\t{\r\n\t\t\"visible\" \"1\"\r\n\t}\r\n}\r\n"
        );
    }

    #[test]
    #[should_panic(expected = "section end name mismatch")]
    fn mismatched_end() {
        let mut w = VmfWriter::new(Vec::new());
        w.start("A");
        w.start("B");
        w.end("A");
    }

    #[test]
    #[should_panic]
    fn end_without_start() {
        let mut w = VmfWriter::new(io::sink());
        w.end("world");
    }

    #[test]
    fn unclosed_is_not_fatal() {
        let mut w = VmfWriter::new(Vec::new());
        w.start("entity");
        assert!(text(w).starts_with("entity\r\n{"));
    }

    #[test]
    fn numbers() {
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(-0.00001), "0");
        assert_eq!(format_float(1.23456), "1.2346");
        assert_eq!(format_float(-128.5), "-128.5");
        assert_eq!(format_float(f64::NAN), "0");
    }

    #[test]
    fn vectors() {
        let v = Vec3::new(1.0, -2.5, 0.0);
        assert_eq!(format_vec(v, VecStyle::Plain), "1 -2.5 0");
        assert_eq!(format_vec(v, VecStyle::Paren), "(1 -2.5 0)");
        assert_eq!(format_vec(v, VecStyle::Bracket), "[1 -2.5 0]");
        assert_eq!(format_vec(Vec3::splat(f32::INFINITY), VecStyle::Paren), "(0 0 0)");

        let mut w = VmfWriter::new(Vec::new());
        w.put_plane("plane", [Vec3::ZERO, Vec3::X, Vec3::Y]);
        w.put_axis("uaxis", &TextureAxis::new(Vec3::NEG_Y, -16, 0.25));
        assert_eq!(
            text(w),
            "\"plane\" \"(0 0 0) (1 0 0) (0 1 0)\"\r\n\"uaxis\" \"[0 -1 0 -16] 0.25\"\r\n"
        );
    }
}
