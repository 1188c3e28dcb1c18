use buddy_heap::{print, BuddyPool, HEAP_SIZE};

fn print_chain(title: &str, blocks: impl Iterator<Item = buddy_heap::BlockInfo>) {
    println!("{}:", title);
    for block in blocks {
        print!("{} -> ", block);
    }
    println!("NULL");
}

fn print_pool(pool: &BuddyPool) {
    print_chain("Heap blocks", pool.blocks());
    print_chain("Free blocks", pool.free_blocks());
}

fn main() -> Result<(), buddy_heap::Error> {
    print::init_logging();

    let mut pool = BuddyPool::new(HEAP_SIZE)?;
    log::info!("Initialized pool with {} units", pool.size());

    let first = pool.allocate(200)?;
    let second = pool.allocate(50)?;
    let third = pool.allocate(500)?;
    if let Err(err) = pool.allocate(5000) {
        log::info!("Allocation of 5000 units failed: {}", err);
    }

    print_pool(&pool);
    println!("{}", pool.stats());

    pool.deallocate(first)?;
    pool.deallocate(second)?;
    pool.deallocate(third)?;

    print_pool(&pool);
    println!("{}", pool.stats());

    Ok(())
}
