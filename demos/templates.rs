//! Template resolution

use envapt::Envapter;

fn main() -> anyhow::Result<()> {
    let env = Envapter::from_vars([
        ("HOST", "db.internal"),
        ("PORT", "5432"),
        ("USER", "app"),
        ("DATABASE_URL", "postgres://${USER}@${HOST}:${PORT}/app"),
        ("MIRROR_URL", "${DATABASE_URL}?replica=true"),
        ("A", "${B}"),
        ("B", "${A}"),
    ]);

    println!("DATABASE_URL = {:?}", env.get("DATABASE_URL")?);
    println!("MIRROR_URL   = {:?}", env.get("MIRROR_URL")?);

    // Cycles are left unexpanded
    println!("A            = {:?}", env.get("A")?);

    // Unknown names stay verbatim
    println!(
        "standalone   = {}",
        env.resolve_template("GREETING", "hello ${USER} from ${NOWHERE}")
    );

    let line = env.tagged(&["connecting to ", ":", " as "], &["HOST", "PORT", "USER"]);
    println!("{line}");

    Ok(())
}
