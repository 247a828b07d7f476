// Script Language
//
// Line-oriented opcode scripts and the fixed direction/command enumerations
// shared with location and item dispatch tables.
//
//   SCRIPT LookAtDoor:
//       ISSTATE 3 1
//       TEXTEND DoorOpen
//
// Parsing is a two-state machine: outside any script, or collecting the body
// of the most recent `SCRIPT` header. A body must end with a terminal opcode
// before the next header (or the end of the source).

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::content_compiler::context::CompilationContext;
use crate::content_compiler::element::{Element, ElementKind, Label, RefWidth};
use crate::content_compiler::error::CompilerError;

/// ISOBJECT tag for an inventory item operand.
pub const OBJECT_TAG_INVENTORY_ICON: u8 = 1;
/// ISOBJECT tag for a direction operand.
pub const OBJECT_TAG_DIRECTION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Here,
    North,
    East,
    South,
    West,
    Up,
    Down,
    Inside,
    Outside,
    Back,
}

impl Direction {
    pub const ALL: [Direction; 10] = [
        Direction::Here,
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::Up,
        Direction::Down,
        Direction::Inside,
        Direction::Outside,
        Direction::Back,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Here => "here",
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Inside => "inside",
            Direction::Outside => "outside",
            Direction::Back => "back",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Result<Direction, CompilerError> {
        let lower = name.to_lowercase();
        Direction::ALL
            .iter()
            .copied()
            .find(|d| d.name() == lower)
            .ok_or_else(|| CompilerError::UnknownDirection(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    Go,
    Look,
    Take,
    Put,
    Use,
    Drop,
    Examine,
    Talk,
    TalkAbout,
    Buy,
    Eat,
    Ponder,
    Wear,
    Remove,
    Choose,
    Pull,
}

impl Command {
    pub const ALL: [Command; 16] = [
        Command::Go,
        Command::Look,
        Command::Take,
        Command::Put,
        Command::Use,
        Command::Drop,
        Command::Examine,
        Command::Talk,
        Command::TalkAbout,
        Command::Buy,
        Command::Eat,
        Command::Ponder,
        Command::Wear,
        Command::Remove,
        Command::Choose,
        Command::Pull,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Go => "go",
            Command::Look => "look",
            Command::Take => "take",
            Command::Put => "put",
            Command::Use => "use",
            Command::Drop => "drop",
            Command::Examine => "examine",
            Command::Talk => "talk",
            Command::TalkAbout => "talk about",
            Command::Buy => "buy",
            Command::Eat => "eat",
            Command::Ponder => "ponder",
            Command::Wear => "wear",
            Command::Remove => "remove",
            Command::Choose => "choose",
            Command::Pull => "pull",
        }
    }

    /// Case-insensitive lookup; `talk_about` is accepted for `talk about`.
    pub fn from_name(name: &str) -> Result<Command, CompilerError> {
        let lower = name.to_lowercase().replace('_', " ");
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.name() == lower)
            .ok_or_else(|| CompilerError::UnknownCommand(name.to_string()))
    }
}

/// A location operand. The pseudo-locations are engine constants, not labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationRef {
    Named(String),
    Lost,
    Current,
    Inventory,
}

impl LocationRef {
    pub fn parse(name: &str) -> LocationRef {
        match name {
            "_LOST" => LocationRef::Lost,
            "_CURRENT" => LocationRef::Current,
            "_INVENTORY" => LocationRef::Inventory,
            _ => LocationRef::Named(name.to_string()),
        }
    }
}

/// ISOBJECT operand, resolved once against the chapter's item names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOperand {
    Item(String),
    Direction(Direction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    End,
    Goto(LocationRef),
    SetItemLoc(String, LocationRef),
    Text(String),
    IfTrue(String),
    Set(u8, u8),
    IsLoc(LocationRef),
    IsState(u8, u8),
    SetTile(u8, u8, u8),
    GoEnd(LocationRef),
    TextEnd(String),
    Take(String),
    TakeEnd(String),
    IsObject(ObjectOperand),
    LocationTextEnd,
    WaitForFire,
    Jump(String),
    IsStateLeq(u8, u8),
    ToMainMenu,
    PlaySound(u16),
}

impl Opcode {
    pub fn code(&self) -> u8 {
        match self {
            Opcode::End => 0,
            Opcode::Goto(_) => 1,
            Opcode::SetItemLoc(..) => 2,
            Opcode::Text(_) => 3,
            Opcode::IfTrue(_) => 4,
            Opcode::Set(..) => 5,
            Opcode::IsLoc(_) => 6,
            Opcode::IsState(..) => 7,
            Opcode::SetTile(..) => 8,
            Opcode::GoEnd(_) => 9,
            Opcode::TextEnd(_) => 10,
            Opcode::Take(_) => 11,
            Opcode::TakeEnd(_) => 12,
            Opcode::IsObject(_) => 13,
            Opcode::LocationTextEnd => 14,
            Opcode::WaitForFire => 15,
            Opcode::Jump(_) => 16,
            Opcode::IsStateLeq(..) => 17,
            Opcode::ToMainMenu => 18,
            Opcode::PlaySound(_) => 19,
        }
    }

    /// Whether the opcode may end a script body.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Opcode::End
                | Opcode::GoEnd(_)
                | Opcode::TextEnd(_)
                | Opcode::TakeEnd(_)
                | Opcode::LocationTextEnd
                | Opcode::Jump(_)
                | Opcode::ToMainMenu
        )
    }

    /// Encoded size including the opcode byte.
    pub fn size(&self) -> usize {
        1 + match self {
            Opcode::End
            | Opcode::LocationTextEnd
            | Opcode::WaitForFire
            | Opcode::ToMainMenu => 0,
            Opcode::Set(..) | Opcode::IsState(..) | Opcode::IsStateLeq(..) => 2,
            Opcode::PlaySound(_) => 2,
            Opcode::SetTile(..) => 3,
            Opcode::SetItemLoc(..) => 6,
            Opcode::IsObject(ObjectOperand::Item(_)) => 4,
            Opcode::IsObject(ObjectOperand::Direction(_)) => 3,
            Opcode::Goto(_)
            | Opcode::Text(_)
            | Opcode::IfTrue(_)
            | Opcode::IsLoc(_)
            | Opcode::GoEnd(_)
            | Opcode::TextEnd(_)
            | Opcode::Take(_)
            | Opcode::TakeEnd(_)
            | Opcode::Jump(_) => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub name: String,
    pub line: usize,
    pub body: Vec<Opcode>,
}

/// Parse a script source. Every reference is registered as used in `context`;
/// LONGTEXT is expanded here against the context's text table.
pub fn parse_scripts(
    source: &str,
    items: &IndexSet<String>,
    context: &mut CompilationContext,
) -> Result<IndexMap<String, Script>, CompilerError> {
    let mut scripts: IndexMap<String, Script> = IndexMap::new();
    let mut current: Option<Script> = None;

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let keyword = parts[0].to_uppercase();

        if keyword == "SCRIPT" {
            if let Some(done) = current.take() {
                close_script(done, &mut scripts)?;
            }
            let name = parts
                .get(1)
                .map(|n| n.trim_end_matches(':'))
                .filter(|n| !n.is_empty())
                .ok_or_else(|| CompilerError::MissingOperand(keyword.clone(), line))?;
            if scripts.contains_key(name) {
                return Err(CompilerError::DuplicateScript(name.to_string(), line));
            }
            current = Some(Script {
                name: name.to_string(),
                line,
                body: Vec::new(),
            });
            continue;
        }

        let Some(script) = current.as_mut() else {
            return Err(CompilerError::OpcodeOutsideScript(keyword, line));
        };
        let operands = Operands {
            keyword: &keyword,
            parts: &parts[1..],
            line,
        };

        if keyword == "LONGTEXT" {
            let key = operands.name(0)?;
            let chunks = context.expand_long_text(key)?;
            let last = chunks.len().saturating_sub(1);
            for (i, chunk) in chunks.into_iter().enumerate() {
                script.body.push(Opcode::Text(chunk));
                if i != last {
                    script.body.push(Opcode::WaitForFire);
                }
            }
            continue;
        }

        let opcode = parse_opcode(&operands, items, context)?;
        script.body.push(opcode);
    }

    if let Some(done) = current.take() {
        close_script(done, &mut scripts)?;
    }
    debug!("Parsed {} scripts", scripts.len());
    Ok(scripts)
}

fn close_script(script: Script, scripts: &mut IndexMap<String, Script>) -> Result<(), CompilerError> {
    match script.body.last() {
        None => Err(CompilerError::EmptyScript(script.name, script.line)),
        Some(last) if !last.is_terminal() => {
            Err(CompilerError::UnterminatedScript(script.name, script.line))
        }
        Some(_) => {
            scripts.insert(script.name.clone(), script);
            Ok(())
        }
    }
}

struct Operands<'a> {
    keyword: &'a str,
    parts: &'a [&'a str],
    line: usize,
}

impl<'a> Operands<'a> {
    fn name(&self, index: usize) -> Result<&'a str, CompilerError> {
        self.parts
            .get(index)
            .copied()
            .ok_or_else(|| CompilerError::MissingOperand(self.keyword.to_string(), self.line))
    }

    fn byte(&self, index: usize) -> Result<u8, CompilerError> {
        let text = self.name(index)?;
        parse_number(text)
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| CompilerError::InvalidOperand(text.to_string(), self.line))
    }

    fn word(&self, index: usize) -> Result<u16, CompilerError> {
        let text = self.name(index)?;
        parse_number(text)
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| CompilerError::InvalidOperand(text.to_string(), self.line))
    }
}

/// Decimal, `$hex` or `0xhex`.
fn parse_number(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix('$') {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn parse_opcode(
    ops: &Operands,
    items: &IndexSet<String>,
    context: &mut CompilationContext,
) -> Result<Opcode, CompilerError> {
    let location = |index: usize, context: &mut CompilationContext| {
        ops.name(index).map(|name| {
            let loc = LocationRef::parse(name);
            if let LocationRef::Named(name) = &loc {
                context.use_location(name);
            }
            loc
        })
    };

    let opcode = match ops.keyword {
        "END" => Opcode::End,
        "GOTO" => Opcode::Goto(location(0, context)?),
        "SETITEMLOC" => {
            let item = ops.name(0)?;
            context.use_item(item);
            Opcode::SetItemLoc(item.to_string(), location(1, context)?)
        }
        "TEXT" => {
            let key = ops.name(0)?;
            context.use_text(key);
            Opcode::Text(key.to_string())
        }
        "IFTRUE" => {
            let name = ops.name(0)?;
            context.use_script(name);
            Opcode::IfTrue(name.to_string())
        }
        "SET" => Opcode::Set(ops.byte(0)?, ops.byte(1)?),
        "ISLOC" => Opcode::IsLoc(location(0, context)?),
        "ISSTATE" => Opcode::IsState(ops.byte(0)?, ops.byte(1)?),
        "SETTILE" => Opcode::SetTile(ops.byte(0)?, ops.byte(1)?, ops.byte(2)?),
        "GOEND" => Opcode::GoEnd(location(0, context)?),
        "TEXTEND" => {
            let key = ops.name(0)?;
            context.use_text(key);
            Opcode::TextEnd(key.to_string())
        }
        "TAKE" => {
            let item = ops.name(0)?;
            context.use_item(item);
            Opcode::Take(item.to_string())
        }
        "TAKEEND" => {
            let item = ops.name(0)?;
            context.use_item(item);
            Opcode::TakeEnd(item.to_string())
        }
        "ISOBJECT" => {
            let name = ops.name(0)?;
            if items.contains(name) {
                context.use_item(name);
                Opcode::IsObject(ObjectOperand::Item(name.to_string()))
            } else {
                Opcode::IsObject(ObjectOperand::Direction(Direction::from_name(name)?))
            }
        }
        "LOCATIONTEXTEND" => Opcode::LocationTextEnd,
        "WAITFORFIRE" => Opcode::WaitForFire,
        "JUMP" => {
            let name = ops.name(0)?;
            context.use_script(name);
            Opcode::Jump(name.to_string())
        }
        "ISSTATELEQ" => Opcode::IsStateLeq(ops.byte(0)?, ops.byte(1)?),
        "TO_MAIN_MENU" => Opcode::ToMainMenu,
        "PLAYSOUND" => Opcode::PlaySound(ops.word(0)?),
        _ => {
            return Err(CompilerError::UnknownOpcode(
                ops.keyword.to_string(),
                ops.line,
            ))
        }
    };
    Ok(opcode)
}

/// Compile one parsed script into its element.
pub fn compile_script(script: &Script) -> Element {
    let mut element = Element::new(ElementKind::Script, Label::Script(script.name.clone()));
    for opcode in &script.body {
        emit_opcode(&mut element, opcode);
    }
    element
}

/// Far location reference, or the fixed bytes of a pseudo-location.
pub fn emit_location(element: &mut Element, location: &LocationRef) {
    match location {
        LocationRef::Named(name) => {
            element.emit_reference(Label::Location(name.clone()), RefWidth::Far)
        }
        LocationRef::Lost => element.emit_bytes(&[0, 0, 0]),
        LocationRef::Current => element.emit_bytes(&[0, 1, 0]),
        LocationRef::Inventory => element.emit_bytes(&[0, 2, 0]),
    }
}

fn emit_opcode(element: &mut Element, opcode: &Opcode) {
    element.emit_byte(opcode.code());
    match opcode {
        Opcode::End
        | Opcode::LocationTextEnd
        | Opcode::WaitForFire
        | Opcode::ToMainMenu => {}
        Opcode::Goto(loc) | Opcode::IsLoc(loc) | Opcode::GoEnd(loc) => emit_location(element, loc),
        Opcode::SetItemLoc(item, loc) => {
            element.emit_reference(Label::Item(item.clone()), RefWidth::Far);
            emit_location(element, loc);
        }
        Opcode::Text(key) | Opcode::TextEnd(key) => {
            element.emit_reference(Label::Text(key.clone()), RefWidth::Far)
        }
        Opcode::IfTrue(name) | Opcode::Jump(name) => {
            element.emit_reference(Label::Script(name.clone()), RefWidth::Far)
        }
        Opcode::Set(a, b) | Opcode::IsState(a, b) | Opcode::IsStateLeq(a, b) => {
            element.emit_bytes(&[*a, *b])
        }
        Opcode::SetTile(a, b, c) => element.emit_bytes(&[*a, *b, *c]),
        Opcode::Take(item) | Opcode::TakeEnd(item) => {
            element.emit_reference(Label::Item(item.clone()), RefWidth::Far)
        }
        Opcode::IsObject(ObjectOperand::Item(item)) => {
            element.emit_byte(OBJECT_TAG_INVENTORY_ICON);
            element.emit_reference(Label::Item(item.clone()), RefWidth::Far);
        }
        Opcode::IsObject(ObjectOperand::Direction(direction)) => {
            element.emit_bytes(&[OBJECT_TAG_DIRECTION, direction.code(), 0]);
        }
        Opcode::PlaySound(id) => element.emit_word(*id),
    }
}
