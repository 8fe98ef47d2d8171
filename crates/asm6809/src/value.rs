//! Value / syntax-tree node model.
//!
//! The parser produces [`Value`] trees for labels, opcodes and arguments;
//! the evaluator reduces them to concrete values.  Nodes are shared through
//! `Rc` and never mutated after construction.  The one exception is the
//! addressing-mode [`Attr`], which lives next to the shared node and is
//! replaced only through [`Value::with_attr`] / [`Value::with_attr_if`].

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// 6809 register names usable in operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reg {
    /// Condition codes.
    Cc,
    /// Accumulator A.
    A,
    /// Accumulator B.
    B,
    /// Direct page register.
    Dp,
    /// Index register X.
    X,
    /// Index register Y.
    Y,
    /// User stack pointer.
    U,
    /// Hardware stack pointer.
    S,
    /// Program counter (raw offset in indexed operands).
    Pc,
    /// Program counter relative (offset computed from a target address).
    Pcr,
    /// Accumulator pair A:B.
    D,
}

impl Reg {
    /// Look up a register by name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Reg> {
        const NAMES: [(&str, Reg); 11] = [
            ("cc", Reg::Cc),
            ("a", Reg::A),
            ("b", Reg::B),
            ("dp", Reg::Dp),
            ("x", Reg::X),
            ("y", Reg::Y),
            ("u", Reg::U),
            ("s", Reg::S),
            ("pc", Reg::Pc),
            ("pcr", Reg::Pcr),
            ("d", Reg::D),
        ];
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, r)| r)
    }

    /// Canonical upper-case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Reg::Cc => "CC",
            Reg::A => "A",
            Reg::B => "B",
            Reg::Dp => "DP",
            Reg::X => "X",
            Reg::Y => "Y",
            Reg::U => "U",
            Reg::S => "S",
            Reg::Pc => "PC",
            Reg::Pcr => "PCR",
            Reg::D => "D",
        }
    }
}

/// Addressing-mode decoration attached to an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Attr {
    /// No decoration.
    #[default]
    None,
    /// `#value`
    Immediate,
    /// `<<value`: force a 5-bit indexed offset.
    Bits5,
    /// `<value`: force direct page / 8-bit offset.
    Bits8,
    /// `>value`: force extended / 16-bit offset.
    Bits16,
    /// `[operand]`
    Indirect,
    /// `,R+`
    PostInc,
    /// `,R++`
    PostInc2,
    /// `,-R`
    PreDec,
    /// `,--R`
    PreDec2,
    /// `,R-`
    PostDec,
}

impl Attr {
    /// Auto increment / decrement attributes belong to the register they
    /// decorate and survive evaluation.
    #[must_use]
    pub fn is_register_mode(self) -> bool {
        matches!(
            self,
            Attr::PostInc | Attr::PostInc2 | Attr::PreDec | Attr::PreDec2 | Attr::PostDec
        )
    }
}

/// Expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    /// Binary `+` or unary plus.
    Add,
    /// Binary `-` or unary negation.
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// Unary `~`
    Not,
    /// Unary `!`
    LogicalNot,
}

impl Op {
    /// Source spelling of the operator.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Shl => "<<",
            Op::Shr => ">>",
            Op::And => "&",
            Op::Or => "|",
            Op::Xor => "^",
            Op::Not => "~",
            Op::LogicalNot => "!",
        }
    }
}

/// The shared, immutable part of a [`Value`].
#[derive(Debug)]
pub enum Node {
    /// Not (yet) resolvable.
    Undefined,
    /// An omitted argument, as in `,X` or `FCB 1,,2`.
    Empty,
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Register name.
    Register(Reg),
    /// String.
    String(String),
    /// `*`: the program counter.
    Pc,
    /// `nB`: nearest local label `n` at or before this line.
    BackRef(i64),
    /// `nF`: nearest local label `n` after this line.
    FwdRef(i64),
    /// `&n` / `&{name}`: positional macro argument or symbol interpolation.
    Interp(String),
    /// Identifier built from literal and interpolated parts.
    Id(Vec<Value>),
    /// Quoted text built from literal and interpolated parts.
    Text(Vec<Value>),
    /// Operator applied to one or two operands.
    Oper(Op, Vec<Value>),
    /// Ordered list, e.g. an argument list.
    Array(Vec<Value>),
}

/// A shared syntax-tree node plus its addressing-mode attribute.
///
/// Cloning takes a new share of the node.  Equality follows assembler
/// semantics: only `Float`, `Int`, `Register` and `String` values of the
/// same kind can compare equal; any other pair, including two `Undefined`
/// values, is unequal.
#[derive(Debug, Clone)]
pub struct Value {
    node: Rc<Node>,
    attr: Attr,
}

impl Value {
    fn new(node: Node) -> Self {
        Self {
            node: Rc::new(node),
            attr: Attr::None,
        }
    }

    /// An unresolved value.
    #[must_use]
    pub fn undefined() -> Self {
        Self::new(Node::Undefined)
    }

    /// An omitted argument.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Node::Empty)
    }

    /// Integer value.
    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::new(Node::Int(v))
    }

    /// Floating-point value.
    #[must_use]
    pub fn float(v: f64) -> Self {
        Self::new(Node::Float(v))
    }

    /// Register value.
    #[must_use]
    pub fn reg(r: Reg) -> Self {
        Self::new(Node::Register(r))
    }

    /// String value.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::new(Node::String(s.into()))
    }

    /// Program counter marker.
    #[must_use]
    pub fn pc() -> Self {
        Self::new(Node::Pc)
    }

    /// Backward local label reference.
    #[must_use]
    pub fn back_ref(n: i64) -> Self {
        Self::new(Node::BackRef(n))
    }

    /// Forward local label reference.
    #[must_use]
    pub fn fwd_ref(n: i64) -> Self {
        Self::new(Node::FwdRef(n))
    }

    /// Interpolation of a positional argument or symbol.
    #[must_use]
    pub fn interp(s: impl Into<String>) -> Self {
        Self::new(Node::Interp(s.into()))
    }

    /// Identifier from parts.
    #[must_use]
    pub fn id(parts: Vec<Value>) -> Self {
        Self::new(Node::Id(parts))
    }

    /// Identifier with a single literal part.
    #[must_use]
    pub fn name(s: impl Into<String>) -> Self {
        Self::id(alloc::vec![Value::string(s)])
    }

    /// Quoted text from parts.
    #[must_use]
    pub fn text(parts: Vec<Value>) -> Self {
        Self::new(Node::Text(parts))
    }

    /// Unary operator.
    #[must_use]
    pub fn unary(op: Op, a: Value) -> Self {
        Self::new(Node::Oper(op, alloc::vec![a]))
    }

    /// Binary operator.
    #[must_use]
    pub fn binary(op: Op, a: Value, b: Value) -> Self {
        Self::new(Node::Oper(op, alloc::vec![a, b]))
    }

    /// Array of values.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self::new(Node::Array(items))
    }

    /// The shared node.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The addressing-mode attribute.
    #[must_use]
    pub fn attr(&self) -> Attr {
        self.attr
    }

    /// Same node, new attribute.
    #[must_use]
    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    /// Apply `attr`, except that [`Attr::None`] does not erase an auto
    /// increment / decrement mode already present.
    #[must_use]
    pub fn with_attr_if(mut self, attr: Attr) -> Self {
        if attr != Attr::None || !self.attr.is_register_mode() {
            self.attr = attr;
        }
        self
    }

    /// Integer payload.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match *self.node {
            Node::Int(v) => Some(v),
            _ => None,
        }
    }

    /// String payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &*self.node {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Register payload.
    #[must_use]
    pub fn as_reg(&self) -> Option<Reg> {
        match *self.node {
            Node::Register(r) => Some(r),
            _ => None,
        }
    }

    /// Array items.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match &*self.node {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Number of items when this is an array, zero otherwise.
    #[must_use]
    pub fn count(&self) -> usize {
        self.as_array().map_or(0, <[Value]>::len)
    }

    /// Whether this is [`Node::Undefined`].
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(*self.node, Node::Undefined)
    }

    /// Whether this is [`Node::Empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(*self.node, Node::Empty)
    }

    /// Short name of the node kind, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match *self.node {
            Node::Undefined => "undefined",
            Node::Empty => "empty",
            Node::Int(_) => "integer",
            Node::Float(_) => "float",
            Node::Register(_) => "register",
            Node::String(_) => "string",
            Node::Pc => "program counter",
            Node::BackRef(_) | Node::FwdRef(_) => "local label reference",
            Node::Interp(_) => "interpolation",
            Node::Id(_) => "identifier",
            Node::Text(_) => "text",
            Node::Oper(..) => "expression",
            Node::Array(_) => "array",
        }
    }

    /// Float operands are truncated to integers; everything else is kept.
    /// Arrays are converted element-wise.  Attributes are preserved.
    #[must_use]
    pub fn float_to_int(&self) -> Value {
        match &*self.node {
            Node::Float(f) => Value::int(*f as i64).with_attr(self.attr),
            Node::Array(items) if items.iter().any(|v| matches!(*v.node, Node::Float(_))) => {
                Value::array(items.iter().map(Value::float_to_int).collect()).with_attr(self.attr)
            }
            _ => self.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&*self.node, &*other.node) {
            (Node::Float(a), Node::Float(b)) => a == b,
            (Node::Int(a), Node::Int(b)) => a == b,
            (Node::Register(a), Node::Register(b)) => a == b,
            (Node::String(a), Node::String(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attr {
            Attr::Bits5 => f.write_str("<<")?,
            Attr::Bits8 => f.write_str("<")?,
            Attr::Bits16 => f.write_str(">")?,
            Attr::Immediate => f.write_str("#")?,
            Attr::PreDec => f.write_str("-")?,
            Attr::PreDec2 => f.write_str("--")?,
            Attr::Indirect => f.write_str("[")?,
            _ => {}
        }
        match &*self.node {
            Node::Undefined => f.write_str("?")?,
            Node::Empty => {}
            Node::Int(v) => write!(f, "{}", v)?,
            Node::Float(v) => write!(f, "{}", v)?,
            Node::Register(r) => f.write_str(r.name())?,
            Node::String(s) => f.write_str(s)?,
            Node::Pc => f.write_str("*")?,
            Node::BackRef(n) => write!(f, "{}B", n)?,
            Node::FwdRef(n) => write!(f, "{}F", n)?,
            Node::Interp(s) => write!(f, "&{{{}}}", s)?,
            Node::Id(parts) => {
                for p in parts {
                    write!(f, "{}", p)?;
                }
            }
            Node::Text(parts) => {
                f.write_str("\"")?;
                for p in parts {
                    write!(f, "{}", p)?;
                }
                f.write_str("\"")?;
            }
            Node::Oper(op, args) => match args.as_slice() {
                [a] => write!(f, "({}{})", op.symbol(), a)?,
                [a, b] => write!(f, "({}{}{})", a, op.symbol(), b)?,
                _ => f.write_str("()")?,
            },
            Node::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
            }
        }
        match self.attr {
            Attr::PostInc => f.write_str("+"),
            Attr::PostInc2 => f.write_str("++"),
            Attr::PostDec => f.write_str("-"),
            Attr::Indirect => f.write_str("]"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec;

    #[test]
    fn equality_is_defined_for_scalars_only() {
        assert_eq!(Value::int(3), Value::int(3));
        assert_ne!(Value::int(3), Value::int(4));
        assert_eq!(Value::string("x"), Value::string("x"));
        assert_eq!(Value::reg(Reg::X), Value::reg(Reg::X));
        assert_eq!(Value::float(1.5), Value::float(1.5));
        assert_ne!(Value::int(1), Value::float(1.0));
        assert_ne!(Value::undefined(), Value::undefined());
        assert_ne!(Value::empty(), Value::empty());
        assert_ne!(Value::pc(), Value::pc());
    }

    #[test]
    fn clone_shares_the_node() {
        let a = Value::array(vec![Value::int(1), Value::int(2)]);
        let b = a.clone();
        assert!(Rc::ptr_eq(&a.node, &b.node));
        assert_eq!(Rc::strong_count(&a.node), 2);
        drop(b);
        assert_eq!(Rc::strong_count(&a.node), 1);
    }

    #[test]
    fn attr_changes_only_by_explicit_step() {
        let v = Value::int(5);
        let imm = v.clone().with_attr(Attr::Immediate);
        assert_eq!(v.attr(), Attr::None);
        assert_eq!(imm.attr(), Attr::Immediate);
    }

    #[test]
    fn register_modes_survive_attr_if_none() {
        let r = Value::reg(Reg::X).with_attr(Attr::PostInc2);
        assert_eq!(r.clone().with_attr_if(Attr::None).attr(), Attr::PostInc2);
        assert_eq!(r.with_attr_if(Attr::Indirect).attr(), Attr::Indirect);
        let v = Value::int(1).with_attr(Attr::Bits8);
        assert_eq!(v.with_attr_if(Attr::None).attr(), Attr::None);
    }

    #[test]
    fn register_lookup_is_case_insensitive() {
        assert_eq!(Reg::from_name("pcr"), Some(Reg::Pcr));
        assert_eq!(Reg::from_name("Dp"), Some(Reg::Dp));
        assert_eq!(Reg::from_name("q"), None);
    }

    #[test]
    fn float_to_int_converts_array_elements() {
        let args = Value::array(vec![Value::float(2.9), Value::int(1), Value::string("s")]);
        let conv = args.float_to_int();
        let items = conv.as_array().unwrap();
        assert_eq!(items[0].as_int(), Some(2));
        assert_eq!(items[1].as_int(), Some(1));
        assert_eq!(items[2].as_str(), Some("s"));
    }

    #[test]
    fn display_matches_source_forms() {
        let v = Value::array(vec![
            Value::empty(),
            Value::reg(Reg::X).with_attr(Attr::PostInc),
        ]);
        assert_eq!(format!("{}", v), ",X+");
        let e = Value::binary(Op::Add, Value::name("start"), Value::int(2));
        assert_eq!(format!("{}", e), "(start+2)");
        assert_eq!(format!("{}", Value::back_ref(1)), "1B");
        assert_eq!(format!("{}", Value::int(4).with_attr(Attr::Immediate)), "#4");
    }
}
