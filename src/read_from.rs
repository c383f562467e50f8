use std::io::{self, Read};
use std::str;
use byteorder::{ReadBytesExt, LE};

pub trait ReadFrom: Sized {
    fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self>;
}

macro_rules! read_byteorder {
    ($($ty:ty, $read_one:ident;)*) => {
        $(
            impl ReadFrom for $ty {
                fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
                    r.$read_one::<LE>()
                }
            }
        )*
    };
}

read_byteorder! {
    u16, read_u16;
    u32, read_u32;
    i32, read_i32;
}

macro_rules! read_tuple {
    ($($($A:ident)*;)*) => {
        $(
            impl<$($A: ReadFrom,)*> ReadFrom for ($($A,)*) {
                #[allow(non_snake_case)]
                fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
                    $( let $A: $A = $A::read_from(r)?; )*
                    Ok(($($A,)*))
                }
            }
        )*
    };
}

read_tuple! {
    A B;
    A B C;
    A B C D E F;
}


pub trait ReadExt: Read {
    fn read_one<T: ReadFrom>(&mut self) -> io::Result<T> {
        T::read_from(self)
    }

    fn read_many<T: ReadFrom>(&mut self, n: usize) -> io::Result<Vec<T>> {
        let mut v = Vec::with_capacity(n);
        for _ in 0 .. n {
            v.push(self.read_one()?);
        }
        Ok(v)
    }

    /// Read a blob of `len` bytes holding NUL-terminated strings back to back, and split it into
    /// its strings.  Bytes after the last terminator are dropped.
    fn read_name_blob(&mut self, len: usize) -> io::Result<Vec<String>> {
        let mut buf = vec![0; len];
        self.read_exact(&mut buf)?;
        let mut names = buf.split(|&b| b == 0).map(|raw| {
            str::from_utf8(raw)
                .map(|s| s.to_owned())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        }).collect::<io::Result<Vec<_>>>()?;
        // `split` always yields the (possibly empty) tail after the final NUL.
        names.pop();
        Ok(names)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}
