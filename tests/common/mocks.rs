//! Mock of a file the sink writes to.
use mockall::mock;

use std::io::{self, Write};

mock! {
    pub Writer {}
    impl Write for Writer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
        fn flush(&mut self) -> io::Result<()>;
    }
}
