use glam::Vec3;

/// Separator used by newer engine branches between IO connection fields
pub const IO_SEP_NEW: char = '\x1b';
pub const IO_SEP_OLD: char = ',';

/// Entity from the entity lump. Key order is preserved, output connections
/// are kept apart from ordinary keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    class_name: String,
    key_values: Vec<(String, String)>,
    io: Vec<(String, String)>,
}

impl Entity {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn from_key_values(key_values: Vec<(String, String)>) -> Self {
        let mut entity = Self::default();
        let mut class_name = None;

        for (key, value) in key_values {
            if key == "classname" {
                if class_name.is_none() {
                    class_name = Some(value);
                } else {
                    log::warn!("Found duplicate classname key, ignoring {value:?}");
                }
                continue;
            }

            if EntityIO::is_connection(&value) {
                entity.io.push((key, value));
            } else {
                entity.set(key, value);
            }
        }

        entity.class_name = match class_name {
            Some(name) if !name.is_empty() => name,
            _ => {
                log::warn!("Missing or empty class name, using \"unknown_entity\"");
                "unknown_entity".to_owned()
            }
        };
        entity
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn set_class_name(&mut self, class_name: impl Into<String>) {
        self.class_name = class_name.into();
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.key_values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.key_values.iter_mut().find(|(k, _)| *k == key) {
            Some(kv) => kv.1 = value,
            None => self.key_values.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.key_values.iter().position(|(k, _)| k == key)?;
        Some(self.key_values.remove(index).1)
    }

    pub fn key_values(&self) -> &[(String, String)] {
        &self.key_values
    }

    pub fn io(&self) -> &[(String, String)] {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut Vec<(String, String)> {
        &mut self.io
    }

    pub fn target_name(&self) -> Option<&str> {
        self.get("targetname")
    }

    /// Parses a space separated vector, missing components are zero
    pub fn vec3(&self, key: &str) -> Option<Vec3> {
        let value = self.get(key)?;
        let mut parts = value.split_whitespace().map(str::parse::<f32>);
        let mut next = || parts.next().unwrap_or(Ok(0.0));
        Some(Vec3::new(next().ok()?, next().ok()?, next().ok()?))
    }

    pub fn origin(&self) -> Option<Vec3> {
        self.vec3("origin")
    }

    /// Pitch, yaw, roll in degrees
    pub fn angles(&self) -> Option<Vec3> {
        self.vec3("angles")
    }

    /// Brush model referenced by this entity
    pub fn model(&self) -> ModelRef {
        match self.get("model") {
            None => ModelRef::None,
            Some("") => ModelRef::Brush(0),
            Some(model) => match model.strip_prefix('*').map(str::parse::<usize>) {
                Some(Ok(index)) => ModelRef::Brush(index),
                _ => ModelRef::Other,
            },
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModelRef {
    None,
    Brush(usize),
    /// Studio model or something unparsable
    Other,
}

/// One output connection: target, input, parameter, delay, times to fire
#[derive(Clone, Debug, PartialEq)]
pub struct EntityIO {
    pub target: String,
    pub input: String,
    pub param: String,
    pub delay: String,
    pub times_to_fire: String,
    /// Vampire and Dark Messiah store two more fields
    pub extra: Vec<String>,
}

impl EntityIO {
    /// 4 separators, or 6 for the Vampire/Dark Messiah comma format
    pub fn is_connection(value: &str) -> bool {
        let mut seps = value.matches(IO_SEP_NEW).count();
        if seps == 0 {
            seps = value.matches(IO_SEP_OLD).count();
        }
        seps == 4 || seps == 6
    }

    pub fn parse(value: &str) -> Option<Self> {
        let mut fields: Vec<&str> = value.split(IO_SEP_NEW).collect();
        if fields.len() < 5 {
            fields = value.split(IO_SEP_OLD).collect();
        }
        if fields.len() < 5 {
            return None;
        }
        Some(Self {
            target: fields[0].to_owned(),
            input: fields[1].to_owned(),
            param: fields[2].to_owned(),
            delay: fields[3].to_owned(),
            times_to_fire: fields[4].to_owned(),
            extra: fields[5..].iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn format(&self, sep: char) -> String {
        let mut out = [
            self.target.as_str(),
            &self.input,
            &self.param,
            &self.delay,
            &self.times_to_fire,
        ]
        .join(&sep.to_string());
        for extra in &self.extra {
            out.push(sep);
            out.push_str(extra);
        }
        out
    }
}

/// Parses the entity lump. Damaged sections are skipped up to the next `}`
/// and whatever was read from them is kept.
pub fn parse_entities(data: &[u8], allow_esc: bool) -> Vec<Entity> {
    // the lump is usually NUL terminated
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let data = &data[..end];

    let mut entities = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match parse_section(data, &mut pos, allow_esc) {
            Some(key_values) => entities.push(Entity::from_key_values(key_values)),
            None => break,
        }
    }
    entities
}

fn parse_section(data: &[u8], pos: &mut usize, allow_esc: bool) -> Option<Vec<(String, String)>> {
    let mut section = false;
    let mut string = false;
    let mut esc = false;
    let mut buf = Vec::with_capacity(512);
    let mut key: Option<String> = None;
    let mut key_values = Vec::new();

    while *pos < data.len() {
        let b = data[*pos];
        *pos += 1;

        let error = match b {
            b'"' if !section => Some("String in unopened section"),
            b'"' if esc => {
                esc = false;
                None
            }
            b'"' => {
                if string {
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    match key.take() {
                        None => key = Some(text),
                        Some(k) if k.is_empty() => {
                            log::debug!("Skipped value {text:?} with empty key at {pos}");
                        }
                        Some(k) => key_values.push((k, text)),
                    }
                    buf.clear();
                }
                string = !string;
                continue;
            }
            b'{' if section && !string => Some("Opened unclosed section"),
            b'{' => {
                section |= !string;
                None
            }
            b'}' if !section && !string => Some("Closed unopened section"),
            b'}' if !string => return Some(key_values),
            b'\\' if allow_esc => {
                esc = true;
                None
            }
            _ => None,
        };

        if let Some(error) = error {
            log::warn!("{error} at {pos}");
            while *pos < data.len() {
                *pos += 1;
                if data[*pos - 1] == b'}' {
                    break;
                }
            }
            return Some(key_values);
        }

        if section && string {
            buf.push(b);
        }
    }
    // unterminated trailing section
    (!key_values.is_empty()).then_some(key_values)
}
