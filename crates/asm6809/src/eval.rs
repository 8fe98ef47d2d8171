//! Expression evaluation.
//!
//! Reduces parsed [`Value`] trees to integers, floats, strings, registers
//! or arrays in the context of the current pass.  Anything that cannot be
//! resolved yet becomes [`Node::Undefined`]; an undefined value propagates
//! through operators so that later passes can fill it in.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::driver::Context;
use crate::error::AsmError;
use crate::value::{Node, Op, Value};

impl Context {
    /// Evaluate a syntax tree.  Unresolvable parts yield
    /// [`Value::undefined`] and record a diagnostic.
    pub fn eval(&mut self, v: &Value) -> Value {
        let attr = v.attr();
        match v.node() {
            Node::Undefined
            | Node::Empty
            | Node::Int(_)
            | Node::Float(_)
            | Node::Register(_)
            | Node::String(_) => v.clone(),
            Node::Pc => Value::int(self.sections.current().pc).with_attr(attr),
            Node::BackRef(n) => {
                let section = self.sections.current();
                let found = section
                    .local_labels
                    .backward(*n, section.line_number, self.pass)
                    .cloned();
                match found {
                    Some(found) => found.with_attr_if(attr),
                    None => self.undefined(alloc::format!("{}B", n)),
                }
            }
            Node::FwdRef(n) => {
                let section = self.sections.current();
                let found = section
                    .local_labels
                    .forward(*n, section.line_number, self.pass)
                    .cloned();
                match found {
                    Some(found) => found.with_attr_if(attr),
                    None => self.undefined(alloc::format!("{}F", n)),
                }
            }
            Node::Interp(name) => self.interp(name).with_attr_if(attr),
            Node::Id(parts) => {
                if let [only] = parts.as_slice() {
                    if let Node::Interp(name) = only.node() {
                        return self.interp(name).with_attr_if(attr);
                    }
                }
                match self.join_parts(parts) {
                    Some(name) => match local_ref(&name) {
                        Some((n, false)) => self.eval(&Value::back_ref(n)).with_attr_if(attr),
                        Some((n, true)) => self.eval(&Value::fwd_ref(n)).with_attr_if(attr),
                        None => self.lookup(&name).with_attr_if(attr),
                    },
                    None => Value::undefined(),
                }
            }
            Node::Text(parts) => match self.join_parts(parts) {
                Some(s) => Value::string(s).with_attr(attr),
                None => Value::undefined(),
            },
            Node::Oper(op, operands) => {
                let vals: Vec<Value> = operands.iter().map(|o| self.eval(o)).collect();
                self.apply(*op, &vals).with_attr_if(attr)
            }
            Node::Array(items) => {
                let vals = items.iter().map(|i| self.eval(i)).collect();
                Value::array(vals).with_attr(attr)
            }
        }
    }

    /// Evaluate to an integer; floats are truncated.
    pub fn eval_int(&mut self, v: &Value) -> Option<i64> {
        let r = self.eval(v);
        match r.node() {
            Node::Int(i) => Some(*i),
            Node::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Evaluate as a name or string.  Identifiers give their own (possibly
    /// interpolated) text rather than a symbol value.
    pub fn eval_string(&mut self, v: &Value) -> Option<String> {
        match v.node() {
            Node::Id(parts) | Node::Text(parts) => self.join_parts(parts),
            Node::String(s) => Some(s.clone()),
            Node::Register(r) => Some(String::from(r.name())),
            Node::Int(i) => Some(i.to_string()),
            Node::Interp(name) => {
                let val = self.interp(name);
                stringify(&val)
            }
            _ => None,
        }
    }

    fn undefined(&mut self, name: String) -> Value {
        let loc = self.loc.clone();
        self.error(AsmError::UndefinedSymbol { name, loc });
        Value::undefined()
    }

    fn lookup(&mut self, name: &str) -> Value {
        match self.symbols.get(name).cloned() {
            Some(v) => v,
            None => self.undefined(String::from(name)),
        }
    }

    /// Positional argument (`&1`) or interpolated symbol (`&{name}`).
    fn interp(&mut self, name: &str) -> Value {
        let Ok(index) = name.parse::<usize>() else {
            return self.lookup(name);
        };
        let Some(args) = self.args_stack.last() else {
            let e = self.syntax("no positional variables on stack");
            self.error(e);
            return Value::undefined();
        };
        let found = args
            .as_array()
            .and_then(|a| a.get(index.wrapping_sub(1)))
            .cloned();
        match found {
            Some(v) => v,
            None => {
                let e = self.syntax(&alloc::format!("invalid positional variable: {}", index));
                self.error(e);
                Value::undefined()
            }
        }
    }

    /// Concatenate literal and interpolated parts.
    fn join_parts(&mut self, parts: &[Value]) -> Option<String> {
        let mut out = String::new();
        for p in parts {
            match p.node() {
                Node::String(s) => out.push_str(s),
                Node::Interp(name) => {
                    let v = self.interp(name);
                    out.push_str(&stringify(&v)?);
                }
                _ => {
                    let v = self.eval(p);
                    out.push_str(&stringify(&v)?);
                }
            }
        }
        Some(out)
    }

    fn apply(&mut self, op: Op, vals: &[Value]) -> Value {
        if vals.iter().any(Value::is_undefined) {
            return Value::undefined();
        }
        match vals {
            [a] => self.apply_unary(op, a),
            [a, b] => self.apply_binary(op, a, b),
            _ => Value::undefined(),
        }
    }

    fn apply_unary(&mut self, op: Op, a: &Value) -> Value {
        match (op, a.node()) {
            (Op::Add, Node::Int(_) | Node::Float(_)) => a.clone().with_attr(Default::default()),
            (Op::Sub, Node::Int(i)) => Value::int(i.wrapping_neg()),
            (Op::Sub, Node::Float(f)) => Value::float(-f),
            (Op::Not, Node::Int(i)) => Value::int(!i),
            (Op::LogicalNot, Node::Int(i)) => Value::int(i64::from(*i == 0)),
            (Op::Not | Op::LogicalNot, Node::Float(f)) => self.apply_unary(op, &Value::int(*f as i64)),
            _ => self.invalid_operands(op, a.kind_name()),
        }
    }

    fn apply_binary(&mut self, op: Op, a: &Value, b: &Value) -> Value {
        match (a.node(), b.node()) {
            (Node::Int(x), Node::Int(y)) => self.int_op(op, *x, *y),
            (Node::Float(_), Node::Int(_) | Node::Float(_))
            | (Node::Int(_), Node::Float(_)) => {
                let x = as_f64(a);
                let y = as_f64(b);
                match op {
                    Op::Add => Value::float(x + y),
                    Op::Sub => Value::float(x - y),
                    Op::Mul => Value::float(x * y),
                    Op::Div if y == 0.0 => self.div_zero(),
                    Op::Div => Value::float(x / y),
                    _ => self.int_op(op, x as i64, y as i64),
                }
            }
            (Node::String(x), Node::String(y)) if op == Op::Add => {
                let mut s = x.clone();
                s.push_str(y);
                Value::string(s)
            }
            _ => self.invalid_operands(op, b.kind_name()),
        }
    }

    fn int_op(&mut self, op: Op, x: i64, y: i64) -> Value {
        let v = match op {
            Op::Add => x.wrapping_add(y),
            Op::Sub => x.wrapping_sub(y),
            Op::Mul => x.wrapping_mul(y),
            Op::Div | Op::Mod if y == 0 => return self.div_zero(),
            Op::Div => x.wrapping_div(y),
            Op::Mod => x.wrapping_rem(y),
            Op::Shl => x.wrapping_shl((y & 63) as u32),
            Op::Shr => x.wrapping_shr((y & 63) as u32),
            Op::And => x & y,
            Op::Or => x | y,
            Op::Xor => x ^ y,
            Op::Not | Op::LogicalNot => return self.invalid_operands(op, "integer"),
        };
        Value::int(v)
    }

    fn div_zero(&mut self) -> Value {
        let e = self.syntax("division by zero");
        self.error(e);
        Value::undefined()
    }

    fn invalid_operands(&mut self, op: Op, kind: &str) -> Value {
        let e = self.syntax(&alloc::format!(
            "invalid {} operand to '{}'",
            kind,
            op.symbol()
        ));
        self.error(e);
        Value::undefined()
    }
}

fn as_f64(v: &Value) -> f64 {
    match v.node() {
        Node::Int(i) => *i as f64,
        Node::Float(f) => *f,
        _ => 0.0,
    }
}

/// Text used when a value is interpolated into a name or string.
fn stringify(v: &Value) -> Option<String> {
    match v.node() {
        Node::String(s) => Some(s.clone()),
        Node::Int(i) => Some(i.to_string()),
        Node::Float(f) => Some(f.to_string()),
        Node::Register(r) => Some(String::from(r.name())),
        _ => None,
    }
}

/// `3B` / `3f` built by interpolation: a local label reference and
/// whether it looks forward.
fn local_ref(name: &str) -> Option<(i64, bool)> {
    let (digits, dir) = name.split_at(name.len().checked_sub(1)?);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let forward = match dir {
        "b" | "B" => false,
        "f" | "F" => true,
        _ => return None,
    };
    Some((digits.parse().ok()?, forward))
}
