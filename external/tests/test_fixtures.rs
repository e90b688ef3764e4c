//! Builds the `.puz` fixtures from a plain description. Nothing here uses the
//! crate, so the checksums pinned in the other tests come from two separate
//! implementations. Set `XWORD_WRITE_FIXTURES=1` to rewrite the files.

use std::path::Path;

fn cksum(data: &[u8], seed: u16) -> u16 {
    data.iter().fold(seed, |c, byte| {
        let c = if c & 1 != 0 { (c >> 1) | 0x8000 } else { c >> 1 };
        c.wrapping_add(u16::from(*byte))
    })
}

struct Fixture {
    name: &'static str,
    width: u8,
    height: u8,
    solution: &'static [u8],
    text: &'static [u8],
    title: &'static [u8],
    author: &'static [u8],
    copyright: &'static [u8],
    clues: &'static [&'static [u8]],
    notes: &'static [u8],
    version: [u8; 4],
    /// Format version whose notes rule the checksums follow.
    checksum_version: u8,
    flags: u16,
    scrambled_cksum: u16,
    sections: &'static [([u8; 4], &'static [u8])],
}

impl Fixture {
    fn strings_cksum(&self, seed: u16) -> u16 {
        let mut c = seed;
        for part in [self.title, self.author, self.copyright] {
            if !part.is_empty() {
                c = cksum(&[0], cksum(part, c));
            }
        }
        for clue in self.clues {
            c = cksum(clue, c);
        }
        if !self.notes.is_empty() && self.checksum_version >= 13 {
            c = cksum(&[0], cksum(self.notes, c));
        }
        c
    }

    fn build(&self) -> Vec<u8> {
        let mut cib = vec![self.width, self.height];
        cib.extend((self.clues.len() as u16).to_le_bytes());
        cib.extend(1u16.to_le_bytes());
        cib.extend(self.flags.to_le_bytes());

        let cib_cksum = cksum(&cib, 0);
        let primary = self.strings_cksum(cksum(self.text, cksum(self.solution, cib_cksum)));
        let partial = [
            cib_cksum,
            cksum(self.solution, 0),
            cksum(self.text, 0),
            self.strings_cksum(0),
        ];
        let mut masked = [0u8; 8];
        for (i, value) in partial.iter().enumerate() {
            masked[i] = b"ICHE"[i] ^ (value & 0xff) as u8;
            masked[i + 4] = b"ATED"[i] ^ (value >> 8) as u8;
        }

        let mut out = primary.to_le_bytes().to_vec();
        out.extend(b"ACROSS&DOWN\0");
        out.extend(cib_cksum.to_le_bytes());
        out.extend(masked);
        out.extend(self.version);
        out.extend([0; 2]);
        out.extend(self.scrambled_cksum.to_le_bytes());
        out.extend([0; 12]);
        out.extend(&cib);
        out.extend(self.solution);
        out.extend(self.text);
        for part in [self.title, self.author, self.copyright] {
            out.extend(part);
            out.push(0);
        }
        for clue in self.clues {
            out.extend(*clue);
            out.push(0);
        }
        out.extend(self.notes);
        out.push(0);
        for (name, data) in self.sections {
            out.extend(name);
            out.extend((data.len() as u16).to_le_bytes());
            out.extend(cksum(data, 0).to_le_bytes());
            out.extend(*data);
            out.push(0);
        }
        out
    }
}

const MINI_CLUES: &[&[u8]] = &[b"Feline pet", b"Taxi", b"Pull a boat", b"Bend at the waist"];
const LOCKED_CLUES: &[&[u8]] = &[b"A1", b"D1", b"D2", b"D3", b"D4", b"A5", b"A6", b"A7"];
const TIMER_AND_CIRCLE: &[([u8; 4], &[u8])] = &[
    (*b"LTIM", b"42,1" as &[u8]),
    (*b"GEXT", &[0x80u8, 0, 0, 0, 0, 0, 0, 0, 0] as &[u8]),
];

const MINI: Fixture = Fixture {
    name: "mini.puz",
    width: 3,
    height: 3,
    solution: b"CATA.OBOW",
    text: b"----.----",
    title: b"Mini",
    author: b"Tester",
    copyright: b"\xa9 2024 Example",
    clues: MINI_CLUES,
    notes: b"",
    version: *b"1.3\0",
    checksum_version: 13,
    flags: 0,
    scrambled_cksum: 0,
    sections: &[],
};

fn fixtures() -> Vec<Fixture> {
    vec![
        MINI,
        Fixture {
            name: "mini_sections.puz",
            text: b"C---.----",
            sections: TIMER_AND_CIRCLE,
            ..MINI
        },
        // Declares 1.2 but checksums the notes as 1.3 files do.
        Fixture {
            name: "notes_v12.puz",
            notes: b"Have fun",
            version: *b"1.2\0",
            ..MINI
        },
        // ABCD/EFGH/IJKL/MNOP scrambled with key 1234.
        Fixture {
            name: "scrambled.puz",
            width: 4,
            height: 4,
            solution: b"TWLNNOOVLOVZXAYJ",
            text: b"----------------",
            title: b"Locked",
            author: b"",
            copyright: b"",
            clues: LOCKED_CLUES,
            flags: 0x0004,
            scrambled_cksum: 0x0007,
            ..MINI
        },
    ]
}

#[test]
fn test_fixtures_rebuild_from_description() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let write = std::env::var_os("XWORD_WRITE_FIXTURES").is_some();
    for fixture in fixtures() {
        let path = dir.join(fixture.name);
        let built = fixture.build();
        if write {
            std::fs::write(&path, &built).unwrap();
        }
        assert_eq!(std::fs::read(&path).unwrap(), built, "{}", fixture.name);
    }
}

#[test]
fn test_mini_checksums() {
    let bytes = MINI.build();
    assert_eq!(&bytes[..2], &0x60b6u16.to_le_bytes());
    assert_eq!(&bytes[0x0E..0x10], &0x5200u16.to_le_bytes());
    assert_eq!(&bytes[0x10..0x18], &[73, 220, 17, 61, 19, 137, 166, 94]);
}
