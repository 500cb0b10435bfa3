use crate::core::TagType;

/// Physical key transitions as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Pressed,
    /// Auto-repeat while held
    Repeated,
    Released,
}

/// Logical actions produced by the host input layer
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Capture,
    /// Raw edge of the capture key
    CaptureKey(KeyEdge),
    /// Raw edge of the peek key
    PeekKey(KeyEdge),
    TogglePlay,
    /// 1-based position in the marker list
    Loop(usize),
    Preview(usize),
    Segment { start: f64, end: f64 },
    Stop,
    Speed(Option<f64>),
    Delete(usize),
    Tag(usize, TagType),
    Word(usize, usize),
    Note(usize, String),
    List,
    Status,
    Save,
    Help,
    Quit,
}

impl HostCommand {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty command"))?
            .to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        let command = match verb.as_str() {
            "m" | "mark" | "capture" => HostCommand::Capture,
            "key" => HostCommand::CaptureKey(Self::edge_arg(&args)?),
            "peek" => HostCommand::PeekKey(Self::edge_arg(&args)?),
            "p" | "toggle" | "play" | "pause" => HostCommand::TogglePlay,
            "l" | "loop" => HostCommand::Loop(Self::index_arg(&args, 0)?),
            "v" | "preview" if args.len() >= 2 => HostCommand::Segment {
                start: Self::float_arg(&args, 0)?,
                end: Self::float_arg(&args, 1)?,
            },
            "v" | "preview" => HostCommand::Preview(Self::index_arg(&args, 0)?),
            "seg" | "segment" => HostCommand::Segment {
                start: Self::float_arg(&args, 0)?,
                end: Self::float_arg(&args, 1)?,
            },
            "s" | "stop" => HostCommand::Stop,
            "r" | "speed" => match args.first() {
                Some(_) => HostCommand::Speed(Some(Self::float_arg(&args, 0)?)),
                None => HostCommand::Speed(None),
            },
            "d" | "delete" => HostCommand::Delete(Self::index_arg(&args, 0)?),
            "t" | "tag" => {
                let index = Self::index_arg(&args, 0)?;
                let name = args.get(1).ok_or_else(|| anyhow::anyhow!("Missing tag name"))?;
                let tag = TagType::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown tag: {}", name))?;
                HostCommand::Tag(index, tag)
            }
            "w" | "word" => {
                let index = Self::index_arg(&args, 0)?;
                let word = args
                    .get(1)
                    .ok_or_else(|| anyhow::anyhow!("Missing word index"))?
                    .parse::<usize>()
                    .map_err(|e| anyhow::anyhow!("Invalid word index: {}", e))?;
                HostCommand::Word(index, word)
            }
            "n" | "note" => {
                let index = Self::index_arg(&args, 0)?;
                HostCommand::Note(index, args[1..].join(" "))
            }
            "ls" | "list" => HostCommand::List,
            "st" | "status" => HostCommand::Status,
            "save" => HostCommand::Save,
            "h" | "help" | "?" => HostCommand::Help,
            "q" | "quit" | "exit" => HostCommand::Quit,
            _ => return Err(anyhow::anyhow!("Unknown command: {}", verb)),
        };
        Ok(command)
    }

    fn edge_arg(args: &[&str]) -> anyhow::Result<KeyEdge> {
        match args.first().map(|raw| raw.to_ascii_lowercase()).as_deref() {
            Some("down") => Ok(KeyEdge::Pressed),
            Some("repeat") => Ok(KeyEdge::Repeated),
            Some("up") => Ok(KeyEdge::Released),
            Some(other) => Err(anyhow::anyhow!("Unknown key edge: {}", other)),
            None => Err(anyhow::anyhow!("Missing key edge (down, repeat, up)")),
        }
    }

    fn index_arg(args: &[&str], position: usize) -> anyhow::Result<usize> {
        let raw = args
            .get(position)
            .ok_or_else(|| anyhow::anyhow!("Missing marker number"))?;
        match raw.parse::<usize>() {
            Ok(0) | Err(_) => Err(anyhow::anyhow!("Invalid marker number: {}", raw)),
            Ok(n) => Ok(n),
        }
    }

    fn float_arg(args: &[&str], position: usize) -> anyhow::Result<f64> {
        let raw = args
            .get(position)
            .ok_or_else(|| anyhow::anyhow!("Missing number"))?;
        let value = raw
            .parse::<f64>()
            .map_err(|e| anyhow::anyhow!("Invalid number {}: {}", raw, e))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(anyhow::anyhow!("Invalid number: {}", raw))
        }
    }

    pub fn help_text() -> &'static str {
        "Commands:\n\
         \x20 m                  mark the current position\n\
         \x20 key down|repeat|up capture key edge (fires once per press)\n\
         \x20 peek down|up       show the current line while held\n\
         \x20 p                  play / pause\n\
         \x20 l <n>              loop marker n\n\
         \x20 v <n>              preview marker n once\n\
         \x20 v <start> <end>    preview a segment once\n\
         \x20 s                  stop loop / preview\n\
         \x20 r [rate]           set or cycle playback speed\n\
         \x20 d <n>              delete marker n\n\
         \x20 t <n> <tag>        toggle a tag on marker n\n\
         \x20 w <n> <i>          toggle word i of marker n as misunderstood\n\
         \x20 n <n> <text>       set the note of marker n\n\
         \x20 ls                 list markers\n\
         \x20 st                 playback status\n\
         \x20 save               save markers\n\
         \x20 q                  quit"
    }
}
