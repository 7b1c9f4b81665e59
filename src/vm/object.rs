use super::RuntimeError;
use super::chunk::Chunk;
use super::table::{Table, hash_string};
use super::value::Value;

/// Index of an object in the heap. Handles are never reused, so identity
/// comparison on them is the language's identity comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjRef(u32);

impl ObjRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A string handle together with its cached FNV-1a hash, as tables key on it.
#[derive(Debug, Clone, Copy)]
pub struct StrRef {
    pub handle: ObjRef,
    pub hash: u32,
}

impl PartialEq for StrRef {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for StrRef {}

#[derive(Debug)]
pub struct ObjString {
    pub chars: Box<str>,
    pub hash: u32,
}

#[derive(Debug)]
pub struct ObjFunction {
    pub arity: usize,
    pub chunk: Chunk,
    /// `None` for the top-level script.
    pub name: Option<StrRef>,
}

pub type NativeFn = fn(&mut Heap, &[Value]) -> Result<Value, RuntimeError>;

pub struct ObjNative {
    pub function: NativeFn,
    pub arity: usize,
    pub name: StrRef,
}

impl std::fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjNative").field("arity", &self.arity).field("name", &self.name).finish()
    }
}

#[derive(Debug)]
pub enum Obj {
    String(ObjString),
    Function(ObjFunction),
    Native(ObjNative),
}

/// Every object a program allocates. Nothing is freed until the heap itself
/// is dropped; no object can reference another in a cycle.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Obj>,
    strings: Table<()>,
}

impl Heap {
    pub fn new() -> Self {
        Heap { objects: Vec::new(), strings: Table::new() }
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn alloc(&mut self, obj: Obj) -> ObjRef {
        let r = ObjRef(self.objects.len() as u32);
        self.objects.push(obj);
        r
    }

    /// The one shared handle for `chars`, allocating it on first sight.
    pub fn intern(&mut self, chars: &str) -> StrRef {
        if let Some(existing) = self.find_interned(chars) {
            return existing;
        }
        let hash = hash_string(chars.as_bytes());
        let handle = self.alloc(Obj::String(ObjString { chars: chars.into(), hash }));
        let key = StrRef { handle, hash };
        self.strings.set(key, ());
        key
    }

    /// Interned handle for `chars` if one exists.
    pub fn find_interned(&self, chars: &str) -> Option<StrRef> {
        let hash = hash_string(chars.as_bytes());
        self.strings.find_string(chars, hash, &self.objects)
    }

    /// A fresh string object that bypasses interning.
    pub fn alloc_string(&mut self, chars: String) -> StrRef {
        let hash = hash_string(chars.as_bytes());
        let handle = self.alloc(Obj::String(ObjString { chars: chars.into_boxed_str(), hash }));
        StrRef { handle, hash }
    }

    pub fn alloc_function(&mut self, function: ObjFunction) -> ObjRef {
        self.alloc(Obj::Function(function))
    }

    pub fn alloc_native(&mut self, native: ObjNative) -> ObjRef {
        self.alloc(Obj::Native(native))
    }

    pub fn get(&self, r: ObjRef) -> &Obj {
        &self.objects[r.index()]
    }

    pub fn string(&self, r: ObjRef) -> Option<&ObjString> {
        match self.get(r) {
            Obj::String(s) => Some(s),
            _ => None,
        }
    }

    /// Content of a string object; empty for anything else.
    pub fn chars(&self, r: ObjRef) -> &str {
        self.string(r).map(|s| &*s.chars).unwrap_or("")
    }

    /// Table key for a string object.
    pub fn str_ref(&self, r: ObjRef) -> Option<StrRef> {
        self.string(r).map(|s| StrRef { handle: r, hash: s.hash })
    }

    pub fn function(&self, r: ObjRef) -> Option<&ObjFunction> {
        match self.get(r) {
            Obj::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn function_mut(&mut self, r: ObjRef) -> Option<&mut ObjFunction> {
        match &mut self.objects[r.index()] {
            Obj::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn native(&self, r: ObjRef) -> Option<&ObjNative> {
        match self.get(r) {
            Obj::Native(n) => Some(n),
            _ => None,
        }
    }

    /// Display name of a function or native object.
    pub fn callable_name(&self, r: ObjRef) -> &str {
        match self.get(r) {
            Obj::Function(f) => f.name.map(|n| self.chars(n.handle)).unwrap_or("script"),
            Obj::Native(n) => self.chars(n.name.handle),
            Obj::String(_) => "",
        }
    }

    /// Every function object in allocation order.
    pub fn functions(&self) -> impl Iterator<Item = (ObjRef, &ObjFunction)> {
        self.objects.iter().enumerate().filter_map(|(i, o)| match o {
            Obj::Function(f) => Some((ObjRef(i as u32), f)),
            _ => None,
        })
    }
}
