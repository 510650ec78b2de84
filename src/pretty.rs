use std::fmt::Display;

/// Byte count shown with a binary suffix, e.g. `4.00K`
pub(crate) struct HumanSize(pub(crate) u64);

impl Display for HumanSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const SUFFIXES: [char; 7] = ['B', 'K', 'M', 'G', 'T', 'P', 'E'];
        let mut number = self.0 as f64;
        let mut suffix_id = 0;
        while number >= 1024.0 && suffix_id < SUFFIXES.len() - 1 {
            number /= 1024.0;
            suffix_id += 1;
        }
        if suffix_id == 0 {
            write!(f, "{}B", self.0)
        } else {
            write!(f, "{:.2}{}", number, SUFFIXES[suffix_id])
        }
    }
}
