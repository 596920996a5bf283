/// Defines state that is built while walking one path of a rule's graph.
///
/// This is implemented for
/// - `String` to produce sentences
/// - `Vec<u8>` to produce the sentence bytes
/// - `Vec<usize>` to collect the visited node positions
/// - `u64` to produce an identifier of the path. Equal paths have equal identifiers.
///
/// Structural nodes (sentinels, brackets, blanks) are passed to `visit_node` only.
pub trait Visitor {
    fn new() -> Self;
    fn visit_node(&mut self, _position: usize) {}
    fn visit_text(&mut self, _text: &str) {}
    /// A reference that was never spliced in, e.g. `<city>`.
    fn visit_reference(&mut self, _name: &str) {}
}

/// Returns the bytes of the sentence.
impl Visitor for Vec<u8> {
    fn new() -> Self {
        Default::default()
    }
    fn visit_text(&mut self, text: &str) {
        self.extend(text.as_bytes());
    }
    fn visit_reference(&mut self, name: &str) {
        self.extend(name.as_bytes());
    }
}

/// Returns the sentence.
impl Visitor for String {
    fn new() -> Self {
        Default::default()
    }
    fn visit_text(&mut self, text: &str) {
        self.push_str(text);
    }
    fn visit_reference(&mut self, name: &str) {
        self.push_str(name);
    }
}

/// Returns the node positions of the path.
impl Visitor for Vec<usize> {
    fn new() -> Self {
        Default::default()
    }
    fn visit_node(&mut self, position: usize) {
        self.push(position);
    }
}

fn id_hash(val: &mut u64, node_id: u64) {
    *val = fxhash::hash64(&(node_id, *val));
}

/// Returns an identifier of the path taken.
impl Visitor for u64 {
    fn new() -> Self {
        u64::MAX
    }
    fn visit_node(&mut self, position: usize) {
        id_hash(self, position as u64)
    }
}

// Code is adapted from:
// <https://doc.rust-lang.org/src/core/tuple.rs.html#10>
// <https://doc.rust-lang.org/src/core/hash/mod.rs.html#879>
macro_rules! impl_visitor_tuple {
    () => (
        impl Visitor for () {
            #[inline]
            fn new() {}
        }
    );

    ( $($name:ident)+) => (
        #[allow(non_snake_case)]
        impl<$($name: Visitor),+> Visitor for ($($name,)+) {
            fn new() -> ($($name,)+) {
                ($({ let x: $name = Visitor::new(); x},)+)
            }

            fn visit_node(&mut self, position: usize) {
                let ($(ref mut $name,)+) = *self;
                $($name.visit_node(position);)+
            }
            fn visit_text(&mut self, text: &str) {
                let ($(ref mut $name,)+) = *self;
                $($name.visit_text(text);)+
            }
            fn visit_reference(&mut self, name: &str) {
                let ($(ref mut $name,)+) = *self;
                $($name.visit_reference(name);)+
            }
        }
    );
}

impl_visitor_tuple! {}
impl_visitor_tuple! { T }
impl_visitor_tuple! { T B }
impl_visitor_tuple! { T B C }
impl_visitor_tuple! { T B C D }
impl_visitor_tuple! { T B C D E }
impl_visitor_tuple! { T B C D E F }
